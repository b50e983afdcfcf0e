//! Port allocation across the registry
//!
//! Three independent port classes (backend admin, worker monitoring,
//! database) are recomputed in full on every run, walking collections in
//! sorted-name order. A collection's last recorded value is a hint, not
//! authoritative truth: kept when still free, otherwise replaced from the
//! running "next free" value. Two collections carrying the same explicit
//! value in one class is a hard error, surfaced before any writes.

use std::collections::BTreeSet;
use std::fmt;

use tracing::debug;

use crate::config::SetupConfig;
use crate::error::SetupError;
use crate::registry::{Collection, Registry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortClass {
    Snoop,
    Flower,
    Pg,
}

impl fmt::Display for PortClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortClass::Snoop => write!(f, "backend admin"),
            PortClass::Flower => write!(f, "worker monitoring"),
            PortClass::Pg => write!(f, "database"),
        }
    }
}

pub struct PortAllocator {
    snoop_base: u16,
    flower_base: u16,
    pg_base: u16,
}

impl PortAllocator {
    pub fn new(config: &SetupConfig) -> Self {
        Self {
            snoop_base: config.snoop_port_base,
            flower_base: config.flower_port_base,
            pg_base: config.pg_port_base,
        }
    }

    /// Recompute all three classes over the whole registry. Idempotent:
    /// a second pass over unchanged state assigns identical values.
    pub fn allocate(&self, registry: &mut Registry) -> Result<(), SetupError> {
        self.check_conflicts(registry)?;

        assign_class(
            registry,
            self.snoop_base,
            |_| true,
            |c| (c.snoop_port != 0).then_some(c.snoop_port),
            |c, port| c.snoop_port = port.unwrap_or(0),
        );
        assign_class(
            registry,
            self.flower_base,
            |c| c.autoindex,
            |c| c.flower_port,
            |c, port| c.flower_port = port,
        );
        // exposed database ports start one above the internal port and the
        // counter advances only for dev-enabled collections
        assign_class(
            registry,
            self.pg_base + 1,
            |c| c.for_dev,
            |c| c.pg_port,
            |c, port| c.pg_port = port,
        );
        Ok(())
    }

    /// Reject duplicate explicit values within a class before anything is
    /// reassigned or written. Such duplicates only arise from manual edits or
    /// partial migrations and deserve an operator decision, not a silent fix.
    fn check_conflicts(&self, registry: &Registry) -> Result<(), SetupError> {
        for (class, eligible, get) in [
            (
                PortClass::Snoop,
                (|_| true) as fn(&Collection) -> bool,
                (|c: &Collection| (c.snoop_port != 0).then_some(c.snoop_port))
                    as fn(&Collection) -> Option<u16>,
            ),
            (PortClass::Flower, |c| c.autoindex, |c| c.flower_port),
            (PortClass::Pg, |c| c.for_dev, |c| c.pg_port),
        ] {
            let mut seen: Vec<(u16, &str)> = Vec::new();
            for (name, collection) in &registry.collections {
                if !eligible(collection) {
                    continue;
                }
                let Some(port) = get(collection) else {
                    continue;
                };
                if let Some((_, first)) = seen.iter().find(|(p, _)| *p == port) {
                    return Err(SetupError::PortConflict {
                        class,
                        port,
                        first: first.to_string(),
                        second: name.clone(),
                    });
                }
                seen.push((port, name));
            }
        }
        Ok(())
    }
}

fn assign_class(
    registry: &mut Registry,
    base: u16,
    eligible: impl Fn(&Collection) -> bool,
    get: impl Fn(&Collection) -> Option<u16>,
    set: impl Fn(&mut Collection, Option<u16>),
) {
    let mut next = base;
    let mut claimed: BTreeSet<u16> = BTreeSet::new();

    for (name, collection) in &mut registry.collections {
        if !eligible(collection) {
            set(collection, None);
            continue;
        }

        let assigned = match get(collection) {
            Some(hint) if !claimed.contains(&hint) => hint,
            _ => {
                while claimed.contains(&next) {
                    next += 1;
                }
                next
            }
        };

        claimed.insert(assigned);
        if assigned >= next {
            next = assigned + 1;
        }
        if get(collection) != Some(assigned) {
            debug!(collection = %name, port = assigned, "Assigned port");
        }
        set(collection, Some(assigned));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Collection;

    fn allocator() -> PortAllocator {
        PortAllocator::new(&SetupConfig::default())
    }

    fn registry_of(names: &[&str]) -> Registry {
        let mut registry = Registry::default();
        for name in names {
            registry
                .collections
                .insert(name.to_string(), Collection::new("snoop2"));
        }
        registry
    }

    #[test]
    fn test_two_collections_from_base() {
        let mut registry = registry_of(&["testdata1", "testdata2"]);
        allocator().allocate(&mut registry).unwrap();

        assert_eq!(registry.collections["testdata1"].snoop_port, 45025);
        assert_eq!(registry.collections["testdata2"].snoop_port, 45026);
        assert_eq!(registry.next_snoop_port(45025), 45027);
        assert_eq!(registry.collections["testdata1"].flower_port, Some(15555));
        assert_eq!(registry.collections["testdata2"].flower_port, Some(15556));
        assert_eq!(registry.dev_instances(), 0);
        assert_eq!(registry.collections["testdata1"].pg_port, None);
    }

    #[test]
    fn test_dev_collections_get_distinct_pg_ports() {
        let mut registry = registry_of(&["testdata1", "testdata2"]);
        for c in registry.collections.values_mut() {
            c.for_dev = true;
        }
        allocator().allocate(&mut registry).unwrap();

        assert_eq!(registry.collections["testdata1"].pg_port, Some(5433));
        assert_eq!(registry.collections["testdata2"].pg_port, Some(5434));
        assert_eq!(registry.dev_instances(), 2);
    }

    #[test]
    fn test_allocation_is_idempotent() {
        let mut registry = registry_of(&["a", "b", "c"]);
        registry.collections.get_mut("b").unwrap().for_dev = true;
        allocator().allocate(&mut registry).unwrap();
        let snapshot: Vec<_> = registry
            .collections
            .values()
            .map(|c| (c.snoop_port, c.flower_port, c.pg_port))
            .collect();

        allocator().allocate(&mut registry).unwrap();
        let again: Vec<_> = registry
            .collections
            .values()
            .map(|c| (c.snoop_port, c.flower_port, c.pg_port))
            .collect();
        assert_eq!(snapshot, again);
    }

    #[test]
    fn test_existing_ports_are_kept() {
        let mut registry = registry_of(&["a", "b"]);
        registry.collections.get_mut("a").unwrap().snoop_port = 45100;
        allocator().allocate(&mut registry).unwrap();

        // a keeps its recorded port; b gets the next free value past it
        assert_eq!(registry.collections["a"].snoop_port, 45100);
        assert_eq!(registry.collections["b"].snoop_port, 45101);
    }

    #[test]
    fn test_hint_below_running_value_is_kept() {
        let mut registry = registry_of(&["a", "b", "c"]);
        registry.collections.get_mut("a").unwrap().snoop_port = 45030;
        registry.collections.get_mut("b").unwrap().snoop_port = 45026;
        allocator().allocate(&mut registry).unwrap();

        assert_eq!(registry.collections["a"].snoop_port, 45030);
        assert_eq!(registry.collections["b"].snoop_port, 45026);
        assert_eq!(registry.collections["c"].snoop_port, 45031);
    }

    #[test]
    fn test_ineligible_classes_are_cleared() {
        let mut registry = registry_of(&["a"]);
        {
            let c = registry.collections.get_mut("a").unwrap();
            c.autoindex = false;
            c.flower_port = Some(15555);
            c.for_dev = false;
            c.pg_port = Some(5433);
        }
        allocator().allocate(&mut registry).unwrap();

        let c = &registry.collections["a"];
        assert_eq!(c.flower_port, None);
        assert_eq!(c.pg_port, None);
    }

    #[test]
    fn test_reenabled_flag_gets_fresh_port() {
        let mut registry = registry_of(&["a", "b"]);
        allocator().allocate(&mut registry).unwrap();
        assert_eq!(registry.collections["a"].flower_port, Some(15555));

        crate::registry::apply_setting(
            &mut registry,
            "autoindex",
            "off",
            Some(&["a".to_string()]),
        )
        .unwrap();
        allocator().allocate(&mut registry).unwrap();
        assert_eq!(registry.collections["a"].flower_port, None);

        crate::registry::apply_setting(
            &mut registry,
            "autoindex",
            "on",
            Some(&["a".to_string()]),
        )
        .unwrap();
        allocator().allocate(&mut registry).unwrap();
        // fresh value, not necessarily the one it had before
        let port = registry.collections["a"].flower_port.unwrap();
        assert_ne!(Some(port), registry.collections["b"].flower_port);
    }

    #[test]
    fn test_duplicate_explicit_ports_are_a_hard_error() {
        let mut registry = registry_of(&["a", "b"]);
        registry.collections.get_mut("a").unwrap().snoop_port = 45025;
        registry.collections.get_mut("b").unwrap().snoop_port = 45025;

        let err = allocator().allocate(&mut registry).unwrap_err();
        match err {
            SetupError::PortConflict {
                class,
                port,
                first,
                second,
            } => {
                assert_eq!(class, PortClass::Snoop);
                assert_eq!(port, 45025);
                assert_eq!((first.as_str(), second.as_str()), ("a", "b"));
            }
            other => panic!("expected PortConflict, got {other:?}"),
        }
        // nothing was reassigned
        assert_eq!(registry.collections["b"].snoop_port, 45025);
    }

    #[test]
    fn test_collision_freedom_across_classes() {
        let mut registry = registry_of(&["a", "b", "c", "d"]);
        for c in registry.collections.values_mut() {
            c.for_dev = true;
        }
        allocator().allocate(&mut registry).unwrap();

        let snoop: BTreeSet<_> = registry.collections.values().map(|c| c.snoop_port).collect();
        let flower: BTreeSet<_> = registry
            .collections
            .values()
            .filter_map(|c| c.flower_port)
            .collect();
        let pg: BTreeSet<_> = registry
            .collections
            .values()
            .filter_map(|c| c.pg_port)
            .collect();
        assert_eq!(snoop.len(), 4);
        assert_eq!(flower.len(), 4);
        assert_eq!(pg.len(), 4);
    }
}
