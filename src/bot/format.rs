//! Result formatting: outcomes to messages and attachments.

use serde::{Deserialize, Serialize};

use super::catalog::Catalog;
use crate::compute::{ActionError, Server, ServerAction};

/// Network whose addresses are shown in server listings.
pub const PRIVATE_NETWORK: &str = "private";

/// A formatting event for the chat surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Output {
    Message { message: String },
    Attachments { attachments: Vec<Attachment> },
}

impl Output {
    pub fn message(text: impl Into<String>) -> Self {
        Output::Message {
            message: text.into(),
        }
    }

    pub fn as_message(&self) -> Option<&str> {
        match self {
            Output::Message { message } => Some(message),
            Output::Attachments { .. } => None,
        }
    }

    /// Plain-text rendering for surfaces without rich attachments.
    pub fn to_plain_text(&self) -> String {
        match self {
            Output::Message { message } => message.clone(),
            Output::Attachments { attachments } => attachments
                .iter()
                .map(Attachment::to_plain_text)
                .collect::<Vec<_>>()
                .join("\n\n"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub title: String,
    pub color: String,
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl Attachment {
    fn to_plain_text(&self) -> String {
        let mut out = self.title.clone();
        for field in &self.fields {
            out.push_str(&format!("\n  {}: {}", field.title, field.value));
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub title: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub short: bool,
}

/// Colour tag for a server status.
pub fn status_color(status: &str) -> &'static str {
    match status.to_lowercase().as_str() {
        "active" | "running" | "normal" => "#008571",
        "shutoff" | "stopped" => "#5a6872",
        "error" | "crashed" => "#e71d32",
        "build" | "reboot" | "hard_reboot" | "paused" | "suspended" => "#efc100",
        _ => "#008571",
    }
}

/// One attachment per server, in the order given.
pub fn server_attachment(server: &Server) -> Attachment {
    let status = server.status.to_lowercase();
    let ips = server
        .addresses_on(PRIVATE_NETWORK)
        .collect::<Vec<_>>()
        .join(", ");

    Attachment {
        title: server.name.clone(),
        color: status_color(&status).to_string(),
        fields: vec![
            Field {
                title: "requested state".to_string(),
                value: status,
                short: true,
            },
            Field {
                title: "IPs".to_string(),
                value: ips,
                short: false,
            },
        ],
    }
}

/// Listing output. An empty snapshot is a single "none found" message.
pub fn format_servers(servers: &[Server], catalog: &Catalog) -> Output {
    if servers.is_empty() {
        return Output::message(catalog.t("vs.not.found", &[]));
    }
    Output::Attachments {
        attachments: servers.iter().map(server_attachment).collect(),
    }
}

/// Message for a finished action.
pub fn format_outcome(
    action: ServerAction,
    name: &str,
    outcome: &Result<Server, ActionError>,
    catalog: &Catalog,
) -> Output {
    let text = match outcome {
        Ok(server) => catalog.t(&format!("vs.{}.success", action), &[&server.name]),
        Err(ActionError::NotFound(_)) => catalog.t("vs.name.not.found", &[name]),
        Err(ActionError::Ambiguous { count, .. }) => {
            catalog.t("vs.name.ambiguous", &[&count.to_string(), name])
        }
        Err(ActionError::Provider(e)) => {
            catalog.t(&format!("vs.{}.failure", action), &[name, &e.payload()])
        }
    };
    Output::message(text)
}

/// Help listing, one line per command.
pub fn help_text(bot_name: &str, catalog: &Catalog) -> String {
    let lines = [
        ("delete|destroy|remove [virtualserver]", "help.vs.destroy"),
        ("show|list", "help.vs.show"),
        ("reboot [virtualserver]", "help.vs.reboot"),
        ("start [virtualserver]", "help.vs.start"),
        ("stop [virtualserver]", "help.vs.stop"),
    ];

    let mut help = String::from("\n");
    for (syntax, key) in lines {
        help.push_str(&format!(
            "{} virtual server {} - {}\n",
            bot_name,
            syntax,
            catalog.t(key, &[])
        ));
    }
    help
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::{Address, ComputeError};
    use std::collections::BTreeMap;

    fn server(name: &str, status: &str, ips: &[&str]) -> Server {
        let mut addresses = BTreeMap::new();
        addresses.insert(
            PRIVATE_NETWORK.to_string(),
            ips.iter()
                .map(|ip| Address {
                    addr: ip.to_string(),
                    version: Some(4),
                    kind: None,
                })
                .collect(),
        );
        addresses.insert(
            "public".to_string(),
            vec![Address {
                addr: "169.1.1.1".to_string(),
                version: Some(4),
                kind: None,
            }],
        );
        Server {
            id: format!("id-{}", name),
            name: name.to_string(),
            status: status.to_string(),
            addresses,
        }
    }

    #[test]
    fn test_empty_listing() {
        let output = format_servers(&[], &Catalog::keys_only());
        assert_eq!(output, Output::message("vs.not.found"));
    }

    #[test]
    fn test_listing_keeps_order_and_private_ips() {
        let servers = vec![
            server("b", "ACTIVE", &["10.0.0.1", "10.0.0.2"]),
            server("a", "SHUTOFF", &[]),
        ];
        let Output::Attachments { attachments } = format_servers(&servers, &Catalog::keys_only())
        else {
            panic!("expected attachments");
        };
        assert_eq!(attachments.len(), 2);
        assert_eq!(attachments[0].title, "b");
        assert_eq!(attachments[0].color, "#008571");
        assert_eq!(attachments[0].fields[0].value, "active");
        assert_eq!(attachments[0].fields[1].value, "10.0.0.1, 10.0.0.2");
        assert_eq!(attachments[1].title, "a");
        assert_eq!(attachments[1].color, "#5a6872");
        assert_eq!(attachments[1].fields[1].value, "");
    }

    #[test]
    fn test_outcome_messages() {
        let catalog = Catalog::keys_only();
        let ok = Ok(server("web", "ACTIVE", &[]));
        assert_eq!(
            format_outcome(ServerAction::Stop, "web", &ok, &catalog),
            Output::message("vs.stop.success:web")
        );

        let missing = Err(ActionError::NotFound("web".into()));
        assert_eq!(
            format_outcome(ServerAction::Destroy, "web", &missing, &catalog),
            Output::message("vs.name.not.found:web")
        );

        let ambiguous = Err(ActionError::Ambiguous {
            name: "web".into(),
            count: 3,
        });
        assert_eq!(
            format_outcome(ServerAction::Reboot, "web", &ambiguous, &catalog),
            Output::message("vs.name.ambiguous:3:web")
        );

        let failed = Err(ActionError::Provider(ComputeError::Status {
            status: 500,
            body: "{\"computeFault\":{}}".into(),
        }));
        assert_eq!(
            format_outcome(ServerAction::Start, "web", &failed, &catalog),
            Output::message("vs.start.failure:web:{\"computeFault\":{}}")
        );
    }

    #[test]
    fn test_output_serializes_like_formatter_events() {
        let json = serde_json::to_value(Output::message("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"message": "hi"}));

        let output = format_servers(&[server("web", "ERROR", &["10.0.0.9"])], &Catalog::keys_only());
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["attachments"][0]["title"], "web");
        assert_eq!(json["attachments"][0]["color"], "#e71d32");
        assert_eq!(json["attachments"][0]["fields"][0]["short"], true);
        assert!(json["attachments"][0]["fields"][1].get("short").is_none());
    }

    #[test]
    fn test_help_has_five_lines() {
        let catalog = Catalog::for_locale("en").unwrap();
        let help = help_text("vsbot", &catalog);
        assert!(help.starts_with('\n'));
        assert_eq!(help.trim().lines().count(), 5);
        for key in [
            "help.vs.destroy",
            "help.vs.show",
            "help.vs.reboot",
            "help.vs.start",
            "help.vs.stop",
        ] {
            assert!(help.contains(&catalog.t(key, &[])));
        }
    }

    #[test]
    fn test_plain_text_rendering() {
        let output = format_servers(&[server("web", "ACTIVE", &["10.0.0.9"])], &Catalog::keys_only());
        assert_eq!(
            output.to_plain_text(),
            "web\n  requested state: active\n  IPs: 10.0.0.9"
        );
    }
}
