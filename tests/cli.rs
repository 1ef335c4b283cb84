//! CLI smoke tests: argument surface and the offline link/status flow.
//! Network-touching commands are covered at the engine level with mocks.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn octosphere() -> Command {
    Command::cargo_bin("octosphere").expect("binary exists")
}

#[test]
fn help_lists_all_subcommands() {
    octosphere()
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("link")
                .and(predicate::str::contains("sync"))
                .and(predicate::str::contains("sync-due"))
                .and(predicate::str::contains("unlink"))
                .and(predicate::str::contains("status")),
        );
}

#[test]
fn missing_environment_is_reported_together() {
    octosphere()
        .args(["status", "--orcid", "0000-0002-1825-0097"])
        .env_remove("OCTOPUS_API_URL")
        .env_remove("OCTOPUS_WEB_URL")
        .env("DATABASE_PATH", "unused.db")
        .assert()
        .failure()
        .stderr(predicate::str::contains("OCTOPUS_API_URL").and(predicate::str::contains("OCTOPUS_WEB_URL")));
}

#[test]
fn link_then_status_round_trips_through_the_ledger() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("octosphere.db");
    let env = [
        ("OCTOPUS_API_URL", "https://api.octopus.test/v1"),
        ("OCTOPUS_WEB_URL", "https://octopus.test"),
        ("ATPROTO_PDS_URL", "https://pds.test"),
    ];

    let mut link = octosphere();
    link.args([
        "link",
        "--orcid",
        "0000-0002-1825-0097",
        "--octopus-user-id",
        "user-1",
        "--handle",
        "alice.test",
        "--app-password",
        "hunter2",
        "--no-verify",
    ]);
    for (key, value) in env {
        link.env(key, value);
    }
    link.env("DATABASE_PATH", &db_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Linked 0000-0002-1825-0097"));

    let mut status = octosphere();
    status.args(["status", "--orcid", "0000-0002-1825-0097"]);
    for (key, value) in env {
        status.env(key, value);
    }
    status
        .env("DATABASE_PATH", &db_path)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("@alice.test")
                .and(predicate::str::contains("never"))
                .and(predicate::str::contains("0 versions")),
        );
}

#[test]
fn unlink_requires_a_linked_identity() {
    let dir = tempdir().unwrap();
    octosphere()
        .args(["unlink", "--orcid", "0000-0000-0000-0000"])
        .env("OCTOPUS_API_URL", "https://api.octopus.test/v1")
        .env("OCTOPUS_WEB_URL", "https://octopus.test")
        .env("DATABASE_PATH", dir.path().join("octosphere.db"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("no linked identity"));
}
