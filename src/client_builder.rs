use std::process::Stdio;

use tokio::{io::BufReader, process::Command};

use crate::{Client, ClientOptions, Result};

impl Client {
    /// Connects over this process's stdin and stdout.
    pub fn from_stdio(options: &ClientOptions) -> Client {
        Client::new(
            BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
            options,
        )
    }

    /// Spawns `command` and connects over the child's piped stdio.
    pub fn from_command(command: &mut Command, options: &ClientOptions) -> Result<Client> {
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()?;
        let stdin = child.stdin.take().unwrap();
        let stdout = child.stdout.take().unwrap();
        Ok(Client::new(BufReader::new(stdout), stdin, options))
    }
}
