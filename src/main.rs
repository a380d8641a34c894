use std::io;
use std::process;

use kaleido::Session;

fn main() {
    let stdin = io::stdin().lock();
    let stderr = io::stderr().lock();

    let mut session = match Session::new(stdin, stderr) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Failed to construct the JIT: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = session.run() {
        eprintln!("I/O error on the diagnostic stream: {}", e);
        process::exit(1);
    }
}
