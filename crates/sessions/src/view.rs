//! Render-context sink that receives data pushed before a view renders.

use parking_lot::Mutex;
use serde_json::{Map, Value};

/// Fired by the view component right before it renders.
pub const RENDER_PRE: &str = "tessera.view.render.pre";

pub trait ViewSink: Send + Sync {
    fn register(&self, key: &str, value: Value);
}

/// Collects registered template variables.
#[derive(Debug, Default)]
pub struct ViewData {
    vars: Mutex<Map<String, Value>>,
}

impl ViewData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.vars.lock().get(key).cloned()
    }

    pub fn vars(&self) -> Map<String, Value> {
        self.vars.lock().clone()
    }
}

impl ViewSink for ViewData {
    fn register(&self, key: &str, value: Value) {
        self.vars.lock().insert(key.to_owned(), value);
    }
}
