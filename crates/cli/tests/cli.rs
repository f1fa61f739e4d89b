use assert_cmd::Command;

#[test]
fn help_lists_subcommands() {
    let output = Command::cargo_bin("bookswap")
        .unwrap()
        .arg("--help")
        .output()
        .unwrap();
    assert!(output.status.success());

    let help = String::from_utf8_lossy(&output.stdout);
    for command in ["serve", "migrate", "seed"] {
        assert!(help.contains(command), "missing {command} in:\n{help}");
    }
}

#[test]
fn migrate_and_seed_a_fresh_database() {
    let dir = std::env::temp_dir().join(format!("bookswap-cli-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let db = dir.join("cli.db");

    Command::cargo_bin("bookswap")
        .unwrap()
        .env("BOOKSWAP_CONFIG_DIR", &dir)
        .args(["--database", db.to_str().unwrap(), "migrate"])
        .assert()
        .success();

    let output = Command::cargo_bin("bookswap")
        .unwrap()
        .env("BOOKSWAP_CONFIG_DIR", &dir)
        .args(["--database", db.to_str().unwrap(), "seed", "--users", "2", "--books", "3"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("seeded 2 users and 3 books"));

    std::fs::remove_dir_all(&dir).ok();
}
