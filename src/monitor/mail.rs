use std::net::TcpStream;

use imap::Session;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use mailparse::{DispositionType, MailHeaderMap, ParsedMail};
use native_tls::{TlsConnector, TlsStream};

use crate::config::EmailConfig;
use crate::error::{LakeError, Result};

fn mail_err(e: impl std::fmt::Display) -> LakeError {
    LakeError::Mail(e.to_string())
}

/// An unread answer to one of our notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Mailbox handle used to mark the message seen.
    pub uid: u32,
    pub subject: String,
    pub body: String,
}

/// Where notifications go and approvals come back from.
pub trait ApprovalChannel {
    fn notify(&mut self, subject: &str, body: &str) -> Result<()>;

    /// Unread replies whose subject contains `subject_marker`.
    fn fetch_replies(&mut self, subject_marker: &str) -> Result<Vec<Reply>>;

    fn mark_seen(&mut self, reply: &Reply) -> Result<()>;

    /// Release any connection held since `fetch_replies`.
    fn close(&mut self) {}
}

// ---------------------------------------------------------------------------
// Mailbox access
// ---------------------------------------------------------------------------

/// The mailbox operations the approval loop needs.
pub trait MailboxSession {
    fn search(&mut self, query: &str) -> Result<Vec<u32>>;

    /// Raw RFC 822 message, fetched without setting `\Seen`.
    fn fetch(&mut self, uid: u32) -> Result<Option<Vec<u8>>>;

    fn mark_seen(&mut self, uid: u32) -> Result<()>;

    fn logout(&mut self) -> Result<()>;
}

/// Opens a logged-in session with `INBOX` selected.
pub trait MailboxConnector {
    type Session: MailboxSession;

    fn connect(&self) -> Result<Self::Session>;
}

type ImapSession = Session<TlsStream<TcpStream>>;

impl MailboxSession for ImapSession {
    fn search(&mut self, query: &str) -> Result<Vec<u32>> {
        let mut uids: Vec<u32> = self.uid_search(query).map_err(mail_err)?.into_iter().collect();
        uids.sort_unstable();
        Ok(uids)
    }

    fn fetch(&mut self, uid: u32) -> Result<Option<Vec<u8>>> {
        // PEEK leaves the message unread until it has been handled.
        let fetches = self.uid_fetch(uid.to_string(), "BODY.PEEK[]").map_err(mail_err)?;
        Ok(fetches.iter().find_map(|f| f.body()).map(<[u8]>::to_vec))
    }

    fn mark_seen(&mut self, uid: u32) -> Result<()> {
        self.uid_store(uid.to_string(), "+FLAGS (\\Seen)").map_err(mail_err)?;
        Ok(())
    }

    fn logout(&mut self) -> Result<()> {
        Session::logout(self).map_err(mail_err)
    }
}

/// IMAP over TLS with the configured credentials.
pub struct ImapConnector {
    server: String,
    port: u16,
    address: String,
    password: String,
}

impl MailboxConnector for ImapConnector {
    type Session = ImapSession;

    fn connect(&self) -> Result<ImapSession> {
        let tls = TlsConnector::builder().build().map_err(mail_err)?;
        let client = imap::connect((self.server.as_str(), self.port), self.server.as_str(), &tls).map_err(mail_err)?;
        let mut session = client
            .login(&self.address, &self.password)
            .map_err(|(e, _)| mail_err(e))?;
        session.select("INBOX").map_err(mail_err)?;
        Ok(session)
    }
}

// ---------------------------------------------------------------------------
// EmailChannel: SMTP out, IMAP in
// ---------------------------------------------------------------------------

/// Sends notifications to, and reads replies from, one mailbox. Each
/// `fetch_replies` opens a fresh session, kept only until `close`.
pub struct EmailChannel<C: MailboxConnector = ImapConnector> {
    config: EmailConfig,
    connector: C,
    session: Option<C::Session>,
}

impl EmailChannel {
    pub fn new(config: EmailConfig) -> Result<Self> {
        if config.address.is_empty() || config.password.is_empty() {
            return Err(LakeError::Config(
                "email address and password are required (set PROTEOLAKE_EMAIL_ADDRESS / PROTEOLAKE_EMAIL_PASSWORD)"
                    .into(),
            ));
        }
        let connector = ImapConnector {
            server: config.imap_server.clone(),
            port: config.imap_port,
            address: config.address.clone(),
            password: config.password.clone(),
        };
        Ok(Self::with_connector(config, connector))
    }
}

impl<C: MailboxConnector> EmailChannel<C> {
    pub fn with_connector(config: EmailConfig, connector: C) -> Self {
        Self {
            config,
            connector,
            session: None,
        }
    }

    /// Drop the current session, logging out if possible.
    fn disconnect(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.logout() {
                log::debug!("IMAP logout failed: {e}");
            }
        }
    }

    fn session(&mut self) -> Result<&mut C::Session> {
        if self.session.is_none() {
            self.session = Some(self.connector.connect()?);
        }
        self.session
            .as_mut()
            .ok_or_else(|| LakeError::Mail("IMAP session unavailable".into()))
    }

    fn fetch_unseen(&mut self, query: &str) -> Result<Vec<Reply>> {
        let session = self.session()?;
        let mut replies = Vec::new();
        for uid in session.search(query)? {
            let Some(raw) = session.fetch(uid)? else { continue };
            match parse_message(uid, &raw) {
                Ok(reply) => replies.push(reply),
                Err(e) => log::warn!("Unreadable message {uid}: {e}"),
            }
        }
        Ok(replies)
    }
}

impl<C: MailboxConnector> ApprovalChannel for EmailChannel<C> {
    fn notify(&mut self, subject: &str, body: &str) -> Result<()> {
        let mailbox: Mailbox = self.config.address.parse().map_err(mail_err)?;
        let message = Message::builder()
            .from(mailbox.clone())
            .to(mailbox)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(mail_err)?;

        let mailer = SmtpTransport::starttls_relay(&self.config.smtp_server)
            .map_err(mail_err)?
            .port(self.config.smtp_port)
            .credentials(Credentials::new(
                self.config.address.clone(),
                self.config.password.clone(),
            ))
            .build();
        mailer.send(&message).map_err(mail_err)?;
        Ok(())
    }

    fn fetch_replies(&mut self, subject_marker: &str) -> Result<Vec<Reply>> {
        // A session left over from an earlier cycle may have timed out.
        self.disconnect();
        let query = format!("UNSEEN SUBJECT \"{}\"", subject_marker.replace('"', ""));
        let result = self.fetch_unseen(&query);
        if result.is_err() {
            self.disconnect();
        }
        result
    }

    fn mark_seen(&mut self, reply: &Reply) -> Result<()> {
        self.session()?.mark_seen(reply.uid)
    }

    fn close(&mut self) {
        self.disconnect();
    }
}

impl<C: MailboxConnector> Drop for EmailChannel<C> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

// ---------------------------------------------------------------------------
// Message parsing
// ---------------------------------------------------------------------------

fn parse_message(uid: u32, raw: &[u8]) -> Result<Reply> {
    let parsed = mailparse::parse_mail(raw).map_err(mail_err)?;
    let subject = parsed.headers.get_first_value("Subject").unwrap_or_default();
    let body = plain_text_body(&parsed)?.unwrap_or_default();
    Ok(Reply { uid, subject, body })
}

/// The first `text/plain` part that is not an attachment.
fn plain_text_body(mail: &ParsedMail<'_>) -> Result<Option<String>> {
    if mail.subparts.is_empty() {
        let disposition = mail.get_content_disposition().disposition;
        if mail.ctype.mimetype == "text/plain" && disposition != DispositionType::Attachment {
            return mail.get_body().map(Some).map_err(mail_err);
        }
        return Ok(None);
    }
    for part in &mail.subparts {
        if let Some(body) = plain_text_body(part)? {
            return Ok(Some(body));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::rc::Rc;

    use super::*;

    /// Mailbox whose open sessions all die when `generation` moves on, the
    /// way an idle IMAP connection is dropped by the server.
    #[derive(Default)]
    struct FakeServer {
        messages: Vec<(u32, String)>,
        seen: HashSet<u32>,
        generation: u32,
        connections: u32,
    }

    struct FakeConnector(Rc<RefCell<FakeServer>>);

    struct FakeSession {
        server: Rc<RefCell<FakeServer>>,
        generation: u32,
    }

    impl FakeSession {
        fn alive(&self) -> Result<()> {
            if self.server.borrow().generation == self.generation {
                Ok(())
            } else {
                Err(LakeError::Mail("connection reset by peer".into()))
            }
        }
    }

    impl MailboxSession for FakeSession {
        fn search(&mut self, _query: &str) -> Result<Vec<u32>> {
            self.alive()?;
            let server = self.server.borrow();
            Ok(server
                .messages
                .iter()
                .map(|(uid, _)| *uid)
                .filter(|uid| !server.seen.contains(uid))
                .collect())
        }

        fn fetch(&mut self, uid: u32) -> Result<Option<Vec<u8>>> {
            self.alive()?;
            let server = self.server.borrow();
            Ok(server
                .messages
                .iter()
                .find(|(u, _)| *u == uid)
                .map(|(_, raw)| raw.clone().into_bytes()))
        }

        fn mark_seen(&mut self, uid: u32) -> Result<()> {
            self.alive()?;
            self.server.borrow_mut().seen.insert(uid);
            Ok(())
        }

        fn logout(&mut self) -> Result<()> {
            self.alive()
        }
    }

    impl MailboxConnector for FakeConnector {
        type Session = FakeSession;

        fn connect(&self) -> Result<FakeSession> {
            let mut server = self.0.borrow_mut();
            server.connections += 1;
            Ok(FakeSession {
                server: self.0.clone(),
                generation: server.generation,
            })
        }
    }

    fn raw_reply(accession: &str, body: &str) -> String {
        format!(
            "Subject: Re: New Pediatric Cancer Dataset Found: {accession}\r\nContent-Type: text/plain\r\n\r\n{body}\r\n"
        )
    }

    fn uids(replies: &[Reply]) -> Vec<u32> {
        replies.iter().map(|r| r.uid).collect()
    }

    #[test]
    fn replies_survive_a_dropped_connection_between_cycles() {
        let server = Rc::new(RefCell::new(FakeServer::default()));
        server.borrow_mut().messages.push((1, raw_reply("PXD000001", "yes")));
        let config = EmailConfig {
            address: "lab@example.org".into(),
            password: "secret".into(),
            ..EmailConfig::default()
        };
        let mut channel = EmailChannel::with_connector(config, FakeConnector(server.clone()));
        let marker = "Re: New Pediatric Cancer Dataset Found";

        let first = channel.fetch_replies(marker).unwrap();
        assert_eq!(uids(&first), vec![1]);

        // The server drops the idle session before the next cycle.
        server.borrow_mut().generation += 1;
        server.borrow_mut().messages.push((2, raw_reply("PXD000002", "no")));
        let second = channel.fetch_replies(marker).unwrap();
        assert_eq!(uids(&second), vec![1, 2]);
        channel.mark_seen(&second[0]).unwrap();
        channel.close();

        server.borrow_mut().generation += 1;
        let third = channel.fetch_replies(marker).unwrap();
        assert_eq!(uids(&third), vec![2]);
        assert!(third[0].body.starts_with("no"));
        assert_eq!(server.borrow().connections, 3);
    }

    #[test]
    fn multipart_reply_yields_the_plain_text_part() {
        let raw = concat!(
            "Subject: Re: New Pediatric Cancer Dataset Found: PXD050001\r\n",
            "Content-Type: multipart/mixed; boundary=\"XX\"\r\n",
            "\r\n",
            "--XX\r\n",
            "Content-Type: text/html\r\n",
            "\r\n",
            "<p>ignored</p>\r\n",
            "--XX\r\n",
            "Content-Type: text/plain\r\n",
            "Content-Disposition: attachment; filename=\"notes.txt\"\r\n",
            "\r\n",
            "no thanks\r\n",
            "--XX\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "Yes please\r\n",
            "--XX--\r\n",
        );
        let reply = parse_message(7, raw.as_bytes()).unwrap();
        assert_eq!(reply.uid, 7);
        assert_eq!(reply.subject, "Re: New Pediatric Cancer Dataset Found: PXD050001");
        assert!(reply.body.starts_with("Yes please"));
    }

    #[test]
    fn single_part_reply_is_read_directly() {
        let raw = "Subject: Re: hello\r\nContent-Type: text/plain\r\n\r\nNo.\r\n";
        let reply = parse_message(1, raw.as_bytes()).unwrap();
        assert!(reply.body.starts_with("No."));
    }

    #[test]
    fn channel_requires_credentials() {
        assert!(EmailChannel::new(EmailConfig::default()).is_err());
    }
}
