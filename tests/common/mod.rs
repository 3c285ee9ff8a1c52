use assert_cmd::Command;
use std::path::Path;

pub fn lunacal_cmd(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("lunacal").unwrap();
    cmd.env("LUNACAL_HOME", home);
    cmd.env_remove("LUNACAL_PASSPHRASE");
    cmd.env_remove("RUST_LOG");
    cmd
}
