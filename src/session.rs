//! Session attributes for a request.
//!
//! The storage backend is up to the host; [`MemorySession`] keeps attributes
//! in memory for tests and single-process servers.

use serde_json::Value;
use std::collections::HashMap;

pub trait Session: Send {
    fn get(&self, name: &str) -> Option<Value>;
    /// Store an attribute. `Value::Null` removes it.
    fn set(&mut self, name: &str, value: Value);
    fn remove(&mut self, name: &str) -> Option<Value>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool { self.len() == 0 }
    fn is_active(&self) -> bool;
    /// Session id, `None` without an active session.
    fn id(&self) -> Option<&str>;
    fn clear(&mut self);
    /// Drop every attribute and end the session.
    fn invalidate(&mut self);
}

#[derive(Debug, Clone, Default)]
pub struct MemorySession {
    id: Option<String>,
    attributes: HashMap<String, Value>,
}

impl MemorySession {
    /// Start a session with a random id.
    pub fn new() -> Self {
        Self { id: Some(hex::encode(rand::random::<[u8; 16]>())), attributes: HashMap::new() }
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self { id: Some(id.into()), attributes: HashMap::new() }
    }

    /// A session that was never started.
    pub fn inactive() -> Self { Self::default() }
}

impl Session for MemorySession {
    fn get(&self, name: &str) -> Option<Value> { self.attributes.get(name).cloned() }

    fn set(&mut self, name: &str, value: Value) {
        if value.is_null() {
            self.attributes.remove(name);
        } else {
            self.attributes.insert(name.to_string(), value);
        }
    }

    fn remove(&mut self, name: &str) -> Option<Value> { self.attributes.remove(name) }
    fn len(&self) -> usize { self.attributes.len() }
    fn is_active(&self) -> bool { self.id.is_some() }
    fn id(&self) -> Option<&str> { self.id.as_deref() }
    fn clear(&mut self) { self.attributes.clear(); }

    fn invalidate(&mut self) {
        self.attributes.clear();
        self.id = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_memory_session() {
        let mut session = MemorySession::new();
        assert!(session.is_active());
        assert_eq!(session.id().map(str::len), Some(32));

        session.set("user", json!("bob"));
        assert_eq!(session.get("user"), Some(json!("bob")));
        assert_eq!(session.len(), 1);

        session.set("user", Value::Null);
        assert!(session.is_empty());

        session.set("a", json!(1));
        session.invalidate();
        assert!(!session.is_active());
        assert!(session.is_empty());
        assert!(!MemorySession::inactive().is_active());
    }
}
