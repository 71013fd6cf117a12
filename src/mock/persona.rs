//! Predefined user personas
//!
//! A persona is a named set of mock rules simulating a logged-in user. The
//! built-in catalog only knows `basic`; further catalogs can be read from JSON:
//!
//! ```json
//! [
//!   {
//!     "name": "admin",
//!     "mocks": [
//!       { "method": "GET", "url": "/api/me", "response": [200, {"Content-Type": "application/json"}, "{\"isAdmin\":true}"] },
//!       { "method": "GET", "url": { "regex": "^/api/user/" }, "response": [404, {}, ""] }
//!     ]
//!   }
//! ]
//! ```

use super::{CannedResponse, MockRule, UrlPattern};
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;

/// A named bundle of mock rules
#[derive(Debug, Clone)]
pub struct Persona {
    pub name: String,
    pub rules: Vec<MockRule>,
}

/// Catalog of personas looked up by name
#[derive(Debug, Clone, Default)]
pub struct PersonaCatalog {
    personas: Vec<Persona>,
}

impl PersonaCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Catalog containing the `basic` persona
    pub fn builtin() -> Self {
        let basic = Persona {
            name: "basic".to_string(),
            rules: vec![
                MockRule::json("GET", "/api/me", "{}"),
                MockRule::json("GET", "/api/config", r#"{"oae-principals":{"user":{"defaultLanguage":"tdd"}}}"#),
                MockRule::json("GET", "/api/ui/widgets", "{}"),
            ],
        };
        Self { personas: vec![basic] }
    }

    /// Parse a JSON persona catalog
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: Vec<RawPersona> = serde_json::from_str(json)?;
        let mut personas = Vec::with_capacity(raw.len());
        for p in raw {
            let mut rules = Vec::with_capacity(p.mocks.len());
            for m in p.mocks {
                let url = match m.url {
                    RawUrl::Exact(s) => UrlPattern::Exact(s),
                    RawUrl::Regex { regex: source } => UrlPattern::Regex(
                        regex::Regex::new(&source)
                            .map_err(|e| Error::ConfigError(format!("persona '{}': bad regex '{}': {}", p.name, source, e)))?,
                    ),
                };
                let (status, headers, body) = m.response;
                rules.push(MockRule::new(&m.method, url, CannedResponse::new(status, headers, body)));
            }
            personas.push(Persona { name: p.name, rules });
        }
        Ok(Self { personas })
    }

    /// Add or replace a persona by name
    pub fn insert(&mut self, persona: Persona) {
        match self.personas.iter_mut().find(|p| p.name == persona.name) {
            Some(existing) => *existing = persona,
            None => self.personas.push(persona),
        }
    }

    /// Merge another catalog into this one; personas in `other` win
    pub fn extend(&mut self, other: PersonaCatalog) {
        for p in other.personas {
            self.insert(p);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Persona> {
        self.personas.iter().find(|p| p.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.personas.iter().map(|p| p.name.as_str())
    }
}

#[derive(Deserialize)]
struct RawPersona {
    name: String,
    #[serde(default)]
    mocks: Vec<RawMock>,
}

#[derive(Deserialize)]
struct RawMock {
    method: String,
    url: RawUrl,
    response: (u16, HashMap<String, String>, String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawUrl {
    Exact(String),
    Regex { regex: String },
}
