use crate::error::BackupError;
use crate::select::DateInterval;
use chrono::{DateTime, FixedOffset, Local};
use log::{debug, info};
use sha2::{Digest, Sha512};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// An email to deliver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Report {
    pub sender: String,
    pub to: String,
    pub subject: String,
    pub html: Option<String>,
    pub plain: Option<String>,
    /// Files attached as plain text.
    pub attachments: Vec<PathBuf>,
}

impl Report {
    /// The status report sent after a backup run, with the run log attached.
    pub fn backup_status(
        sender: &str,
        to: &str,
        remote: &str,
        kind: &str,
        destination: &str,
        interval: &DateInterval,
        log_path: &Path,
    ) -> Self {
        let from_date = interval.from.format("%Y-%m-%d");
        let to_date = interval.to.format("%Y-%m-%d");
        let subject = format!(
            "GPhotos Backup Status ({}): {} - {}",
            kind, from_date, to_date
        );
        let html = format!(
            "<h2>Backup Status:</h2>\n\
             <span style=\"font-size: 130%;\"><b>From: </b></span>\
             <span style=\"font-size: 120%;\">{}:{},</span>\n\
             <span style=\"font-size: 130%;\"><b>To: </b></span>\
             <span style=\"font-size: 120%;\">{},</span>\n\
             <span style=\"font-size: 130%;\"><b>Period: </b></span>\
             <span style=\"font-size: 120%;\">{} - {}</span>\n",
            escape_html(remote),
            escape_html(kind),
            escape_html(destination),
            from_date,
            to_date,
        );
        Report {
            sender: sender.to_string(),
            to: to.to_string(),
            subject,
            html: Some(html),
            plain: None,
            attachments: vec![log_path.to_path_buf()],
        }
    }
}

fn escape_html(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Encodes a header value as an RFC 2047 encoded word if it is not ASCII.
fn encode_header(value: &str) -> String {
    if value.bytes().all(|b| (0x20..0x7f).contains(&b)) {
        return value.to_string();
    }
    let mut encoded = String::from("=?utf-8?Q?");
    for b in value.bytes() {
        match b {
            b' ' => encoded.push('_'),
            b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'!' | b'*' | b'+' | b'-' | b'/' => {
                encoded.push(char::from(b))
            }
            _ => encoded.push_str(&format!("={:02X}", b)),
        }
    }
    encoded.push_str("?=");
    encoded
}

struct Attachment {
    file_name: String,
    content: String,
}

fn read_attachment(path: &Path) -> Result<Attachment, BackupError> {
    let content = fs::read(path)?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment.txt".to_string());
    Ok(Attachment {
        file_name,
        content: String::from_utf8_lossy(&content).into_owned(),
    })
}

fn boundary_tag(report: &Report, attachments: &[Attachment], date: &DateTime<FixedOffset>) -> String {
    let mut hasher = Sha512::new();
    hasher.update(report.subject.as_bytes());
    for body in report.html.iter().chain(report.plain.iter()) {
        hasher.update(body.as_bytes());
    }
    for attachment in attachments {
        hasher.update(attachment.content.as_bytes());
    }
    hasher.update(date.to_rfc3339().as_bytes());
    let digest = hasher.finalize();
    digest[..16].iter().map(|b| format!("{:02x}", b)).collect()
}

/// Line breaks would end the header and start another one.
fn check_header(name: &str, value: &str) -> Result<(), BackupError> {
    if value.contains(|c| c == '\r' || c == '\n') {
        return Err(BackupError::Notification(format!(
            "{} header {:?} contains a line break",
            name, value
        )));
    }
    Ok(())
}

fn push_header(out: &mut String, name: &str, value: &str) {
    out.push_str(name);
    out.push_str(": ");
    out.push_str(value);
    out.push('\n');
}

fn push_text_part(out: &mut String, subtype: &str, body: &str) {
    push_header(out, "Content-Type", &format!("text/{}; charset=utf-8", subtype));
    push_header(out, "Content-Transfer-Encoding", "8bit");
    out.push('\n');
    out.push_str(body);
    if !body.ends_with('\n') {
        out.push('\n');
    }
}

/// Renders the report as a `multipart/mixed` MIME message.
pub fn compose(report: &Report, date: &DateTime<FixedOffset>) -> Result<String, BackupError> {
    let attachments = report
        .attachments
        .iter()
        .map(|path| read_attachment(path))
        .collect::<Result<Vec<_>, _>>()?;
    check_header("From", &report.sender)?;
    check_header("To", &report.to)?;
    check_header("Subject", &report.subject)?;
    let tag = boundary_tag(report, &attachments, date);
    let boundary = format!("=_mixed_{}", tag);

    let mut out = String::new();
    push_header(&mut out, "From", &report.sender);
    push_header(&mut out, "To", &report.to);
    push_header(&mut out, "Subject", &encode_header(&report.subject));
    push_header(&mut out, "Date", &date.to_rfc2822());
    push_header(&mut out, "MIME-Version", "1.0");
    push_header(
        &mut out,
        "Content-Type",
        &format!("multipart/mixed; boundary=\"{}\"", boundary),
    );
    out.push('\n');

    out.push_str(&format!("--{}\n", boundary));
    match (&report.plain, &report.html) {
        (Some(plain), Some(html)) => {
            let alternative = format!("=_alt_{}", tag);
            push_header(
                &mut out,
                "Content-Type",
                &format!("multipart/alternative; boundary=\"{}\"", alternative),
            );
            out.push('\n');
            out.push_str(&format!("--{}\n", alternative));
            push_text_part(&mut out, "plain", plain);
            out.push_str(&format!("--{}\n", alternative));
            push_text_part(&mut out, "html", html);
            out.push_str(&format!("--{}--\n", alternative));
        }
        (Some(plain), None) => push_text_part(&mut out, "plain", plain),
        (None, Some(html)) => push_text_part(&mut out, "html", html),
        (None, None) => {
            return Err(BackupError::Notification(
                "message has neither an HTML nor a plain text body".to_string(),
            ))
        }
    }

    for attachment in &attachments {
        out.push_str(&format!("--{}\n", boundary));
        push_header(
            &mut out,
            "Content-Disposition",
            &format!(
                "attachment; filename=\"{}\"",
                attachment.file_name.replace('"', "")
            ),
        );
        push_text_part(&mut out, "plain", &attachment.content);
    }
    out.push_str(&format!("--{}--\n", boundary));
    Ok(out)
}

pub trait Notifier {
    fn send(&self, report: &Report) -> Result<(), BackupError>;
}

/// Delivers reports through a sendmail compatible command.
pub struct SendmailNotifier {
    command: PathBuf,
}

impl SendmailNotifier {
    pub fn new(command: &Path) -> Self {
        SendmailNotifier {
            command: command.to_path_buf(),
        }
    }
}

impl Notifier for SendmailNotifier {
    fn send(&self, report: &Report) -> Result<(), BackupError> {
        let now: DateTime<FixedOffset> = Local::now().into();
        let message = compose(report, &now)?;
        debug!("Piping {} bytes into {}", message.len(), self.command.display());

        let mut child = Command::new(&self.command)
            .args(["-t", "-oi"])
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|err| {
                BackupError::Notification(format!(
                    "cannot run {}: {}",
                    self.command.display(),
                    err
                ))
            })?;
        // Dropping stdin closes the pipe so the command sees the end.
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(message.as_bytes())?;
        }
        let status = child.wait()?;
        if !status.success() {
            return Err(BackupError::Notification(format!(
                "{} {}",
                self.command.display(),
                status
            )));
        }
        info!("Sent {:?} to {}", report.subject, report.to);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn date() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2021, 7, 1, 6, 0, 0)
            .unwrap()
    }

    fn report(html: Option<&str>, plain: Option<&str>) -> Report {
        Report {
            sender: "me@example.com".to_string(),
            to: "logs@example.com".to_string(),
            subject: "Hello".to_string(),
            html: html.map(str::to_string),
            plain: plain.map(str::to_string),
            attachments: vec![],
        }
    }

    fn boundary_of(message: &str) -> &str {
        let start = message.find("boundary=\"").unwrap() + "boundary=\"".len();
        let end = start + message[start..].find('"').unwrap();
        &message[start..end]
    }

    #[test]
    fn test_backup_status() {
        let interval = DateInterval::new(
            NaiveDate::from_ymd_opt(2021, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2021, 6, 30).unwrap(),
        );
        let report = Report::backup_status(
            "me@example.com",
            "logs@example.com",
            "gphotos",
            "album",
            "/backup",
            &interval,
            Path::new("/tmp/backup-1.txt"),
        );
        assert_eq!(report.subject, "GPhotos Backup Status (album): 2021-06-01 - 2021-06-30");
        let html = report.html.unwrap();
        assert!(html.starts_with("<h2>Backup Status:</h2>"));
        assert!(html.contains(">gphotos:album,</span>"));
        assert!(html.contains(">/backup,</span>"));
        assert!(html.contains(">2021-06-01 - 2021-06-30</span>"));
        assert_eq!(report.attachments, vec![PathBuf::from("/tmp/backup-1.txt")]);
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a<b>&\"c\""), "a&lt;b&gt;&amp;&quot;c&quot;");
    }

    #[test]
    fn test_encode_header() {
        assert_eq!(encode_header("GPhotos Backup Status"), "GPhotos Backup Status");
        assert_eq!(encode_header("Café Trip"), "=?utf-8?Q?Caf=C3=A9_Trip?=");
    }

    #[test]
    fn test_compose_html_only() {
        let message = compose(&report(Some("<p>hi</p>"), None), &date()).unwrap();
        let boundary = boundary_of(&message);
        assert!(message.starts_with(&format!(
            "From: me@example.com\nTo: logs@example.com\nSubject: Hello\n\
             Date: {}\nMIME-Version: 1.0\n",
            date().to_rfc2822()
        )));
        assert!(message.contains(&format!(
            "--{}\nContent-Type: text/html; charset=utf-8\n\
             Content-Transfer-Encoding: 8bit\n\n<p>hi</p>\n--{}--\n",
            boundary, boundary
        )));
        assert!(!message.contains("multipart/alternative"));
    }

    #[test]
    fn test_compose_alternative_and_attachment() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("backup-7.txt");
        fs::write(&log_path, "  Status: true\n").unwrap();
        let mut report = report(Some("<p>hi</p>"), Some("hi"));
        report.attachments.push(log_path);

        let message = compose(&report, &date()).unwrap();
        let boundary = boundary_of(&message);
        assert!(message.contains(&format!(
            "multipart/alternative; boundary=\"{}\"",
            boundary.replace("=_mixed_", "=_alt_")
        )));
        let plain_at = message.find("text/plain; charset=utf-8\nContent-Transfer-Encoding: 8bit\n\nhi\n");
        let html_at = message.find("text/html");
        assert!(plain_at.unwrap() < html_at.unwrap());
        assert!(message.contains(
            "Content-Disposition: attachment; filename=\"backup-7.txt\"\n\
             Content-Type: text/plain; charset=utf-8\n\
             Content-Transfer-Encoding: 8bit\n\n  Status: true\n"
        ));
        assert!(message.ends_with(&format!("--{}--\n", boundary)));
        // Same content gives the same message.
        assert_eq!(message, compose(&report, &date()).unwrap());
    }

    #[test]
    fn test_compose_without_body() {
        assert!(matches!(
            compose(&report(None, None), &date()),
            Err(BackupError::Notification(_))
        ));
    }

    #[test]
    fn test_compose_missing_attachment() {
        let mut report = report(None, Some("hi"));
        report.attachments.push(PathBuf::from("/nonexistent/backup-0.txt"));
        assert!(matches!(compose(&report, &date()), Err(BackupError::Io(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_sendmail() {
        let notifier = SendmailNotifier::new(Path::new("false"));
        assert!(notifier.send(&report(None, Some("hi"))).is_err());
    }

    #[test]
    fn test_compose_rejects_line_breaks() {
        let mut injected = report(None, Some("hi"));
        injected.subject = "Hello\nBcc: all@example.com".to_string();
        assert!(matches!(
            compose(&injected, &date()),
            Err(BackupError::Notification(_))
        ));

        let mut injected = report(None, Some("hi"));
        injected.to = "logs@example.com\r\nBcc: all@example.com".to_string();
        assert!(matches!(
            compose(&injected, &date()),
            Err(BackupError::Notification(_))
        ));
    }
}
