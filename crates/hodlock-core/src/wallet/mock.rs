use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{CoreError, WalletError};

use super::WalletBridge;

enum Reply {
    Value(Value),
    Error { code: i64, message: String },
}

/// A mock wallet bridge for testing. Answers each method with a canned
/// value or JSON-RPC error, and records every call it receives.
pub struct MockBridge {
    replies: HashMap<String, Reply>,
    calls: Mutex<Vec<(String, Vec<Value>)>>,
}

impl MockBridge {
    pub fn builder() -> MockBridgeBuilder {
        MockBridgeBuilder {
            replies: HashMap::new(),
        }
    }

    /// Method names received so far, in order.
    pub fn methods(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(method, _)| method.clone())
            .collect()
    }

    pub fn params_of(&self, method: &str) -> Option<Vec<Value>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, params)| params.clone())
    }
}

pub struct MockBridgeBuilder {
    replies: HashMap<String, Reply>,
}

impl MockBridgeBuilder {
    pub fn respond(mut self, method: &str, value: Value) -> Self {
        self.replies.insert(method.to_owned(), Reply::Value(value));
        self
    }

    /// Answer `method` with a JSON-RPC error. Code 4001 is a user rejection.
    pub fn fail(mut self, method: &str, code: i64, message: &str) -> Self {
        self.replies.insert(
            method.to_owned(),
            Reply::Error {
                code,
                message: message.to_owned(),
            },
        );
        self
    }

    pub fn build(self) -> MockBridge {
        MockBridge {
            replies: self.replies,
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl WalletBridge for MockBridge {
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, CoreError> {
        self.calls
            .lock()
            .unwrap()
            .push((method.to_owned(), params));

        match self.replies.get(method) {
            Some(Reply::Value(value)) => Ok(value.clone()),
            Some(Reply::Error { code: 4001, message }) => {
                Err(WalletError::Rejected(message.clone()).into())
            }
            Some(Reply::Error { code, message }) => Err(WalletError::Provider {
                code: *code,
                message: message.clone(),
            }
            .into()),
            None => Err(WalletError::Provider {
                code: -32601,
                message: format!("method not found: {method}"),
            }
            .into()),
        }
    }
}
