//! Minimal `{{ name }}` substitution for configuration templates.
//!
//! The artifact templates under `templates/` only need plain placeholder
//! replacement; there is no conditional logic in the templates themselves.

pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (name, value) in vars {
        out = out.replace(&format!("{{{{ {name} }}}}"), value);
    }
    out
}
