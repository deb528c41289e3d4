//! Global registry of connection-checker implementations, so an embedder can
//! install a custom rule set per workspace by name.

use hashbrown::HashMap;
use lazy_static::lazy_static;
use parking_lot::RwLock;

use crate::checker::{ConnectionChecker, StandardChecker};

pub type CheckerFactory = fn() -> Box<dyn ConnectionChecker>;

pub const DEFAULT_CHECKER: &str = "standard";

lazy_static! {
    static ref CHECKERS: RwLock<HashMap<String, CheckerFactory>> = {
        let mut map: HashMap<String, CheckerFactory> = HashMap::new();
        map.insert(DEFAULT_CHECKER.to_string(), || Box::new(StandardChecker));
        RwLock::new(map)
    };
}

/// Registers a checker factory under a name, replacing any previous
/// registration with the same name.
pub fn register_checker(name: &str, factory: CheckerFactory) {
    CHECKERS.write().insert(name.to_string(), factory);
}

pub fn unregister_checker(name: &str) {
    CHECKERS.write().remove(name);
}

pub fn create_checker(name: &str) -> Option<Box<dyn ConnectionChecker>> {
    CHECKERS.read().get(name).map(|factory| factory())
}

pub fn default_checker() -> Box<dyn ConnectionChecker> {
    Box::new(StandardChecker)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_checker_is_registered() {
        assert!(create_checker(DEFAULT_CHECKER).is_some());
        assert!(create_checker("no_such_checker").is_none());
    }

    #[test]
    fn register_and_unregister() {
        register_checker("custom_for_registry_test", || Box::new(StandardChecker));
        assert!(create_checker("custom_for_registry_test").is_some());
        unregister_checker("custom_for_registry_test");
        assert!(create_checker("custom_for_registry_test").is_none());
    }
}
