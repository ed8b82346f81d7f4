//! Integration tests for the relay channel FIFO listener.
//!
//! Each test stands in for the relay script: it opens the FIFO for writing,
//! sends a line, and disconnects, exactly like one picker invocation.

#![cfg(unix)]

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use tempfile::TempDir;
use tokio::time::timeout;

use fzf_mcp_rs::relay::RelayChannel;
use fzf_mcp_rs::types::{RelayCommand, RelayMessage};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Write lines to the FIFO from a throwaway writer, like one relay-script
/// run. The blocking open rendezvouses with the listener's reopen.
fn connect_and_write(address: &str, lines: &[&str]) -> std::thread::JoinHandle<()> {
    let address = address.to_string();
    let lines: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
    std::thread::spawn(move || {
        let mut pipe = std::fs::OpenOptions::new()
            .write(true)
            .open(&address)
            .expect("open fifo for writing");
        for line in lines {
            writeln!(pipe, "{line}").expect("write relay line");
        }
    })
}

async fn recv(channel: &mut RelayChannel) -> RelayMessage {
    timeout(RECV_TIMEOUT, channel.recv())
        .await
        .expect("message within timeout")
        .expect("channel still open")
}

#[tokio::test]
async fn delivers_decoded_messages() {
    let dir = TempDir::new().expect("temp dir");
    let mut channel = RelayChannel::open_in(dir.path(), 1111).expect("open channel");

    let writer = connect_and_write(channel.address(), &["open$$/home/u$$notes.txt"]);

    let message = recv(&mut channel).await;
    assert_eq!(message.command, RelayCommand::Open);
    assert_eq!(message.working_directory, Path::new("/home/u"));
    assert_eq!(message.argument, "notes.txt");
    writer.join().expect("writer thread");
}

#[tokio::test]
async fn accepts_messages_after_writer_disconnects() {
    let dir = TempDir::new().expect("temp dir");
    let mut channel = RelayChannel::open_in(dir.path(), 2222).expect("open channel");

    // First picker invocation: write one line, close the pipe.
    connect_and_write(channel.address(), &["open$$/home/u$$first.txt"])
        .join()
        .expect("first writer");
    let first = recv(&mut channel).await;
    assert_eq!(first.argument, "first.txt");

    // The listener must have re-armed; a second invocation still lands.
    connect_and_write(channel.address(), &["rg$$/home/u$$src/a.rs:12:5"])
        .join()
        .expect("second writer");
    let second = recv(&mut channel).await;
    assert_eq!(second.command, RelayCommand::Rg);
    assert_eq!(second.argument, "src/a.rs:12:5");
}

#[tokio::test]
async fn delivers_multiple_lines_from_one_writer_in_order() {
    let dir = TempDir::new().expect("temp dir");
    let mut channel = RelayChannel::open_in(dir.path(), 3333).expect("open channel");

    let writer = connect_and_write(
        channel.address(),
        &["open$$/srv$$a.txt", "open$$/srv$$b.txt"],
    );

    assert_eq!(recv(&mut channel).await.argument, "a.txt");
    assert_eq!(recv(&mut channel).await.argument, "b.txt");
    writer.join().expect("writer thread");
}

#[tokio::test]
async fn silently_drops_empty_arguments() {
    let dir = TempDir::new().expect("temp dir");
    let mut channel = RelayChannel::open_in(dir.path(), 4444).expect("open channel");

    // A cancelled picker writes an empty argument; only the real selection
    // that follows may come through.
    let writer = connect_and_write(
        channel.address(),
        &["open$$/srv$$", "add$$/srv$$vendor"],
    );

    let message = recv(&mut channel).await;
    assert_eq!(message.command, RelayCommand::Add);
    assert_eq!(message.argument, "vendor");
    writer.join().expect("writer thread");
}

#[tokio::test]
async fn colliding_addresses_get_numeric_suffixes() {
    let dir = TempDir::new().expect("temp dir");

    let first = RelayChannel::open_in(dir.path(), 5555).expect("open first channel");
    let second = RelayChannel::open_in(dir.path(), 5555).expect("open second channel");

    assert_eq!(
        first.address(),
        dir.path().join("fzf-pipe-5555").display().to_string()
    );
    assert_eq!(
        second.address(),
        dir.path().join("fzf-pipe-5555-1").display().to_string()
    );
}

#[tokio::test]
async fn close_removes_the_fifo() {
    let dir = TempDir::new().expect("temp dir");
    let mut channel = RelayChannel::open_in(dir.path(), 6666).expect("open channel");
    let path = Path::new(channel.address()).to_path_buf();
    assert!(path.exists());

    channel.close();

    assert!(!path.exists());
    assert!(timeout(RECV_TIMEOUT, channel.recv())
        .await
        .expect("recv resolves after close")
        .is_none());
}
