//! Package descriptor (the manifest stored verbatim with every version).
//!
//! Only the fields the registry reads are modelled; everything else is kept in
//! `extra` so a parsed descriptor serializes back without losing keys.

use crate::error::Result;
use rocket::serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Descriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implements: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Person>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub maintainers: Vec<Person>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contributors: Vec<Person>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Descriptor {
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A person named in a descriptor. Accepts either an object or the
/// `"Name <email> (web)"` short form.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(from = "PersonRepr")]
pub struct Person {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PersonRepr {
    Text(String),
    Detailed {
        name: String,
        #[serde(default)]
        email: Option<String>,
        #[serde(default, alias = "url")]
        web: Option<String>,
    },
}

impl From<PersonRepr> for Person {
    fn from(repr: PersonRepr) -> Self {
        match repr {
            PersonRepr::Text(text) => Person::parse(&text),
            PersonRepr::Detailed { name, email, web } => Person {
                name,
                email: non_empty(email),
                web: non_empty(web),
            },
        }
    }
}

impl Person {
    /// Parses `"Name <email> (web)"`; email and web are optional.
    pub fn parse(text: &str) -> Self {
        let delimited = |open: char, close: char| {
            let start = text.find(open)? + 1;
            let end = start + text[start..].find(close)?;
            non_empty(Some(text[start..end].trim().to_string()))
        };

        let name_end = text.find(|c: char| c == '<' || c == '(').unwrap_or(text.len());

        Person {
            name: text[..name_end].trim().to_string(),
            email: delimited('<', '>'),
            web: delimited('(', ')'),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
