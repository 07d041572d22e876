//! Capability tags (§4.4): declarative strings on a plugin manifest like
//! `evidence.read`, `records.write(derived.text.*)`,
//! `network.egress(host=127.0.0.1,port=9000)`, `media.read(source=stage1)`.
//! Parsed into a tag plus an ordered parameter list so the broker can
//! compare a requested capability against a declared one without
//! re-parsing strings on every call.

use std::collections::BTreeMap;

use scrybe_types::ScrybeError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capability {
    pub tag: String,
    pub params: BTreeMap<String, String>,
}

impl Capability {
    pub fn parse(raw: &str) -> Result<Self, ScrybeError> {
        let raw = raw.trim();
        let Some(open) = raw.find('(') else {
            return Ok(Capability { tag: raw.to_string(), params: BTreeMap::new() });
        };
        if !raw.ends_with(')') {
            return Err(ScrybeError::SchemaMismatch(format!("malformed capability string: {raw}")));
        }
        let tag = raw[..open].to_string();
        let body = &raw[open + 1..raw.len() - 1];
        let mut params = BTreeMap::new();
        if !body.is_empty() {
            for pair in body.split(',') {
                let mut parts = pair.splitn(2, '=');
                let key = parts
                    .next()
                    .ok_or_else(|| ScrybeError::SchemaMismatch(format!("malformed capability param in: {raw}")))?
                    .trim();
                let value = parts.next().unwrap_or("").trim();
                params.insert(key.to_string(), value.to_string());
            }
        }
        Ok(Capability { tag, params })
    }

    /// `true` when `self` (a declared capability) covers `requested` (a
    /// capability a plugin is trying to exercise at call time). A
    /// declared capability with no params covers any request with the
    /// same tag; a declared capability with params requires every one
    /// of its params to match the request's value exactly.
    pub fn covers(&self, requested: &Capability) -> bool {
        if self.tag != requested.tag {
            return false;
        }
        self.params.iter().all(|(k, v)| requested.params.get(k) == Some(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_tag() {
        let cap = Capability::parse("evidence.read").unwrap();
        assert_eq!(cap.tag, "evidence.read");
        assert!(cap.params.is_empty());
    }

    #[test]
    fn parses_params() {
        let cap = Capability::parse("network.egress(host=127.0.0.1,port=9000)").unwrap();
        assert_eq!(cap.tag, "network.egress");
        assert_eq!(cap.params.get("host").unwrap(), "127.0.0.1");
        assert_eq!(cap.params.get("port").unwrap(), "9000");
    }

    #[test]
    fn declared_without_params_covers_any_request_with_same_tag() {
        let declared = Capability::parse("media.read").unwrap();
        let requested = Capability::parse("media.read(source=stage1)").unwrap();
        assert!(declared.covers(&requested));
    }

    #[test]
    fn declared_with_params_requires_matching_value() {
        let declared = Capability::parse("media.read(source=stage1)").unwrap();
        let wrong = Capability::parse("media.read(source=stage2)").unwrap();
        assert!(!declared.covers(&wrong));
    }

    #[test]
    fn rejects_malformed_string() {
        assert!(Capability::parse("media.read(source=stage1").is_err());
    }
}
