// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Subjects and bodies per notification.

use super::{EmailInput, Notification};

/// A rendered email, plain text and HTML alternatives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub text: String,
    pub html: String,
}

pub fn render(input: &EmailInput) -> RenderedEmail {
    let title = &input.agreement_title;
    let name = if input.recipient.name.is_empty() {
        input.recipient.email.as_str()
    } else {
        input.recipient.name.as_str()
    };
    let link = input.action_url().unwrap_or_default();

    let (subject, lead, call_to_action) = match input.notification {
        Notification::Invitation => (
            format!("Please sign: {}", title),
            format!("You have been asked to sign \"{}\".", title),
            "Review and sign",
        ),
        Notification::Reminder => (
            format!("Reminder: {} is waiting for your signature", title),
            format!("\"{}\" is still waiting for your signature.", title),
            "Review and sign",
        ),
        Notification::CompletionPackage => (
            format!("Completed: {}", title),
            format!("All parties have signed \"{}\".", title),
            "Download the completed documents",
        ),
    };

    let text = format!(
        "Hello {name},\n\n{lead}\n\n{call_to_action}: {link}\n\nReference: {correlation}\n",
        correlation = input.correlation_id,
    );
    let html = format!(
        "<p>Hello {name},</p>\n<p>{lead}</p>\n<p><a href=\"{link}\">{call_to_action}</a></p>\n\
         <p style=\"color:#888\">Reference: {correlation}</p>\n",
        name = escape(name),
        lead = escape(&lead),
        link = escape(link),
        correlation = escape(&input.correlation_id),
    );

    RenderedEmail {
        subject,
        text,
        html,
    }
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
