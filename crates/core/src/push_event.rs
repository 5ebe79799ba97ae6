//! The subset of a GitHub push payload the agent reads.
//!
//! Only `repository.ssh_url` is used for matching; the remaining fields are
//! kept for log context. Unknown fields are ignored and missing ones default
//! to empty so that pings and trimmed payloads still parse.

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PushEvent {
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub before: String,
    pub after: String,
    pub repository: Repository,
    pub pusher: Pusher,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Repository {
    pub name: String,
    pub full_name: String,
    pub ssh_url: String,
    pub clone_url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Pusher {
    pub name: String,
    pub email: String,
}

impl PushEvent {
    /// Parse a raw JSON request body.
    pub fn parse(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    /// The repository SSH URL used as the registry matching key.
    pub fn ssh_url(&self) -> &str {
        &self.repository.ssh_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_push_payload() {
        let body = br#"{
            "ref": "refs/heads/master",
            "before": "69b3f38550378518a4d79983f9a8d041aa6c458e",
            "after": "5979ddf50f80eece2af7ccaca21fcb776cbade3b",
            "repository": {
                "id": 215826756,
                "name": "hooktail",
                "full_name": "klipitkas/hooktail",
                "private": false,
                "owner": {"login": "klipitkas", "id": 3259834},
                "ssh_url": "git@github.com:klipitkas/hooktail.git",
                "clone_url": "https://github.com/klipitkas/hooktail.git",
                "homepage": null,
                "license": {"key": "unlicense"}
            },
            "pusher": {"name": "klipitkas", "email": "klipitkas@users.noreply.github.com"},
            "commits": [],
            "forced": false
        }"#;
        let event = PushEvent::parse(body).expect("valid payload");
        assert_eq!(event.ssh_url(), "git@github.com:klipitkas/hooktail.git");
        assert_eq!(event.git_ref, "refs/heads/master");
        assert_eq!(event.repository.full_name, "klipitkas/hooktail");
        assert_eq!(event.pusher.name, "klipitkas");
    }

    #[test]
    fn missing_repository_defaults_to_empty_url() {
        let event = PushEvent::parse(br#"{"zen":"Keep it logically awesome."}"#).expect("json object");
        assert_eq!(event.ssh_url(), "");
    }

    #[test]
    fn non_json_body_fails() {
        assert!(PushEvent::parse(b"this is a non json request").is_err());
    }
}
