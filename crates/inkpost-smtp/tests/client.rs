//! Integration tests for the SMTP client.
//!
//! Each test runs a scripted SMTP server on a loopback socket and drives
//! the type-state client against it over plain TCP.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_test::assert_ok;

use inkpost_smtp::connection::connect_with;
use inkpost_smtp::{Address, Client, Error, Security, SmtpConnection};

const TIMEOUT: Duration = Duration::from_secs(5);

/// Scripted server behaviour.
#[derive(Clone, Copy)]
struct Script {
    greet: bool,
    reject_rcpt: bool,
}

async fn start(script: Script) -> (u16, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let (read, mut write) = socket.into_split();
        let mut reader = BufReader::new(read);
        let mut received = Vec::new();

        if !script.greet {
            tokio::time::sleep(Duration::from_secs(2)).await;
            return received;
        }
        write.write_all(b"220 mx.test ESMTP ready\r\n").await.unwrap();

        let mut in_data = false;
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                break;
            }
            let line = line.trim_end_matches(['\r', '\n']).to_string();
            received.push(line.clone());

            if in_data {
                if line == "." {
                    in_data = false;
                    write
                        .write_all(b"250 2.0.0 Ok: queued as ABC123\r\n")
                        .await
                        .unwrap();
                }
                continue;
            }

            let upper = line.to_ascii_uppercase();
            let response: &[u8] = if upper.starts_with("EHLO") {
                b"250-mx.test\r\n250-SIZE 1000000\r\n250 AUTH PLAIN LOGIN\r\n"
            } else if upper.starts_with("AUTH PLAIN") {
                b"235 2.7.0 Authentication successful\r\n"
            } else if upper.starts_with("RCPT TO") && script.reject_rcpt {
                b"550 5.1.1 No such user\r\n"
            } else if upper.starts_with("MAIL FROM") || upper.starts_with("RCPT TO") {
                b"250 2.1.0 Ok\r\n"
            } else if upper == "DATA" {
                in_data = true;
                b"354 End data with <CR><LF>.<CR><LF>\r\n"
            } else if upper == "QUIT" {
                write.write_all(b"221 2.0.0 Bye\r\n").await.unwrap();
                break;
            } else {
                b"502 5.5.2 Command not recognized\r\n"
            };
            write.write_all(response).await.unwrap();
        }

        received
    });

    (port, handle)
}

async fn connected(port: u16) -> Client<inkpost_smtp::Connected> {
    let stream = connect_with("127.0.0.1", port, Security::None, TIMEOUT)
        .await
        .unwrap();
    let client = Client::from_stream(stream, TIMEOUT).await.unwrap();
    client.ehlo("client.test").await.unwrap()
}

#[tokio::test]
async fn sends_message_and_reports_queue_id() {
    let (port, server) = start(Script {
        greet: true,
        reject_rcpt: false,
    })
    .await;

    let client = connected(port).await;
    assert_eq!(client.server_info().hostname, "mx.test");
    assert_eq!(client.server_info().max_message_size(), Some(1_000_000));

    let client = assert_ok!(client.authenticate("user", "secret").await);
    let message = b"Subject: Hi\r\n\r\n.leading dot\r\nbody\r\n";
    let client = client
        .mail_from(Address::new("from@example.com").unwrap(), Some(message.len()))
        .await
        .unwrap();
    let client = client
        .rcpt_to(Address::new("to@example.com").unwrap())
        .await
        .unwrap();
    let client = client.data().await.unwrap();
    let (client, reply) = client.send_message(message).await.unwrap();
    assert_eq!(reply.queue_id().as_deref(), Some("ABC123"));
    assert_ok!(client.quit().await);

    let received = server.await.unwrap();
    assert!(received.iter().any(|l| l.starts_with("AUTH PLAIN ")));
    assert!(received.contains(&format!("MAIL FROM:<from@example.com> SIZE={}", message.len())));
    assert!(received.contains(&"..leading dot".to_string()));
    assert!(received.contains(&".".to_string()));
}

#[tokio::test]
async fn recipient_rejection_is_permanent() {
    let (port, _server) = start(Script {
        greet: true,
        reject_rcpt: true,
    })
    .await;

    let client = connected(port).await;
    let client = client
        .mail_from(Address::new("from@example.com").unwrap(), None)
        .await
        .unwrap();
    let err = client
        .rcpt_to(Address::new("nobody@example.com").unwrap())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::SmtpError { code: 550, .. }));
    assert!(err.is_permanent());
}

#[tokio::test]
async fn oversized_message_is_refused_before_mail_from() {
    let (port, _server) = start(Script {
        greet: true,
        reject_rcpt: false,
    })
    .await;

    let client = connected(port).await;
    let err = client
        .mail_from(Address::new("from@example.com").unwrap(), Some(2_000_000))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::MessageTooLarge {
            size: 2_000_000,
            limit: 1_000_000
        }
    ));
}

#[tokio::test]
async fn silent_server_times_out_as_transient() {
    let (port, _server) = start(Script {
        greet: false,
        reject_rcpt: false,
    })
    .await;

    let stream = connect_with("127.0.0.1", port, Security::None, TIMEOUT)
        .await
        .unwrap();
    let err = Client::from_stream(stream, Duration::from_millis(200))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Timeout(_, "greeting")));
    assert!(err.is_transient());
}
