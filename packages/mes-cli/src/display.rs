//! Terminal rendering of session events.

use chrono::{DateTime, Local};

use mes_core::{ChatMessage, MessageContent, MessageOrigin, SessionEvent, TransferProgress};

/// Progress lines are printed at these steps only.
const PROGRESS_STEP: f64 = 0.25;

fn clock(ts: i64) -> String {
    DateTime::from_timestamp_millis(ts)
        .map(|t| t.with_timezone(&Local).format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".to_string())
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// One line describing a message.
pub fn describe_message(message: &ChatMessage, origin: MessageOrigin) -> String {
    let who = match origin {
        MessageOrigin::Local => "you".to_string(),
        MessageOrigin::Remote => format!("{} ({})", message.nick, message.sender),
    };
    match &message.content {
        MessageContent::Text(text) => format!("[{}] {}: {}", clock(message.ts), who, text),
        MessageContent::Attachment { meta, .. } => format!(
            "[{}] {}: <{} {} {}>",
            clock(message.ts),
            who,
            meta.kind,
            meta.name,
            human_size(meta.size)
        ),
    }
}

/// Whether a progress update lands on a printed step.
pub fn progress_worth_printing(progress: &TransferProgress) -> bool {
    if progress.is_complete() || progress.done == 1 {
        return true;
    }
    let previous = f64::from(progress.done - 1) / f64::from(progress.total);
    (progress.fraction / PROGRESS_STEP).floor() > (previous / PROGRESS_STEP).floor()
}

pub fn describe_progress(progress: &TransferProgress) -> String {
    format!(
        "{} {} {:>3.0}% ({}/{})",
        match progress.direction {
            mes_core::transfer::TransferDirection::Outbound => "sending",
            mes_core::transfer::TransferDirection::Inbound => "receiving",
        },
        short_id(&progress.transfer_id),
        progress.fraction * 100.0,
        progress.done,
        progress.total
    )
}

/// Render an event, or `None` for events not shown.
pub fn describe(event: &SessionEvent) -> Option<String> {
    match event {
        SessionEvent::Message { message, origin } => Some(describe_message(message, *origin)),
        SessionEvent::Presence { count } => Some(format!("* {} online", count)),
        SessionEvent::Progress(progress) if progress_worth_printing(progress) => {
            Some(describe_progress(progress))
        }
        SessionEvent::Progress(_) => None,
        SessionEvent::Notice(text) => Some(format!("! {}", text)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mes_core::protocol::TransferMeta;
    use mes_core::transfer::TransferDirection;
    use mes_core::PayloadKind;

    fn message(content: MessageContent) -> ChatMessage {
        ChatMessage {
            id: "abc".into(),
            sender: "k3J9xQ".into(),
            nick: "ana".into(),
            ts: 0,
            content,
        }
    }

    #[test]
    fn test_describe_text() {
        let line = describe_message(&message(MessageContent::Text("hi".into())), MessageOrigin::Remote);
        assert!(line.ends_with("ana (k3J9xQ): hi"));

        let line = describe_message(&message(MessageContent::Text("hi".into())), MessageOrigin::Local);
        assert!(line.ends_with("you: hi"));
    }

    #[test]
    fn test_describe_attachment() {
        let content = MessageContent::Attachment {
            meta: TransferMeta {
                name: "a.png".into(),
                mime: "image/png".into(),
                size: 1_048_576,
                kind: PayloadKind::Image,
            },
            data: Vec::new(),
        };
        let line = describe_message(&message(content), MessageOrigin::Remote);
        assert!(line.ends_with("<image a.png 1.0 MiB>"));
    }

    #[test]
    fn test_presence_and_notice() {
        assert_eq!(
            describe(&SessionEvent::Presence { count: 3 }).unwrap(),
            "* 3 online"
        );
        assert_eq!(
            describe(&SessionEvent::Notice("offline".into())).unwrap(),
            "! offline"
        );
    }

    #[test]
    fn test_progress_steps() {
        let printed: Vec<u32> = (1..=10)
            .filter(|&done| {
                progress_worth_printing(&TransferProgress::new(
                    "t",
                    TransferDirection::Inbound,
                    done,
                    10,
                ))
            })
            .collect();
        assert_eq!(printed, vec![1, 3, 5, 8, 10]);
    }

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(12), "12 B");
        assert_eq!(human_size(1536), "1.5 KiB");
    }
}
