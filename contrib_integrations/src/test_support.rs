#![cfg(test)]

use crate::http::Fetch;
use async_trait::async_trait;
use contrib_core::{Error, Result};
use reqwest::Url;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Replays canned bodies for URLs containing a pattern. `None` replays a transport failure.
/// Unscripted URLs fail like an unreachable host.
#[derive(Default)]
pub struct ScriptedFetch {
    routes: Mutex<Vec<(String, VecDeque<Option<String>>)>>,
    requested: Mutex<Vec<String>>,
}

impl ScriptedFetch {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, pattern: &str, body: Option<String>) -> Self {
        {
            let mut routes = self.routes.lock().unwrap();
            match routes.iter_mut().find(|(p, _)| p == pattern) {
                Some((_, queue)) => queue.push_back(body),
                None => routes.push((pattern.to_string(), VecDeque::from([body]))),
            }
        }
        self
    }

    pub fn respond(self, pattern: &str, body: impl Into<String>) -> Self {
        self.push(pattern, Some(body.into()))
    }

    pub fn fail(self, pattern: &str) -> Self {
        self.push(pattern, None)
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }

    pub fn count(&self, pattern: &str) -> usize {
        self.requested()
            .iter()
            .filter(|u| u.contains(pattern))
            .count()
    }
}

#[async_trait]
impl Fetch for ScriptedFetch {
    async fn get_text(&self, url: &Url) -> Result<String> {
        let url = url.to_string();
        self.requested.lock().unwrap().push(url.clone());
        let mut routes = self.routes.lock().unwrap();
        let next = routes
            .iter_mut()
            .find(|(p, queue)| url.contains(p.as_str()) && !queue.is_empty())
            .and_then(|(_, queue)| queue.pop_front());
        match next {
            Some(Some(body)) => Ok(body),
            Some(None) => Err(Error::BackendMessage(format!("scripted failure for {url}"))),
            None => Err(Error::BackendMessage(format!("no scripted response for {url}"))),
        }
    }
}
