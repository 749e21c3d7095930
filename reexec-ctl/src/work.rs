//! Work kinds shipped by the demonstrations

use reexec_rs::{Catalog, ExecError, Work, connect_promise, this_process};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;

/// Every binary image must build the same catalog, workers included
pub fn catalog() -> Catalog {
    Catalog::new()
        .register::<Greet>()
        .register::<Answer>()
        .register::<PrintPid>()
        .register::<Fail>()
        .register::<Dial>()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Greet {
    pub name: String,
}

impl Work for Greet {
    const TAG: &'static str = "greet";
    type Output = String;
    type Error = Infallible;

    fn run(self) -> Result<String, Infallible> {
        let greeting = format!("hello, {} (from process {})", self.name, this_process::get_id());
        println!("{}", greeting);
        Ok(greeting)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Answer;

impl Work for Answer {
    const TAG: &'static str = "answer";
    type Output = i32;
    type Error = Infallible;

    fn run(self) -> Result<i32, Infallible> {
        Ok(13)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PrintPid {
    pub index: usize,
}

impl Work for PrintPid {
    const TAG: &'static str = "print_pid";
    type Output = ();
    type Error = Infallible;

    fn run(self) -> Result<(), Infallible> {
        println!("worker {} is process {}", self.index, this_process::get_id());
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Fail {
    pub message: String,
}

impl Work for Fail {
    const TAG: &'static str = "fail";
    type Output = i32;
    type Error = String;

    fn run(self) -> Result<i32, String> {
        Err(self.message)
    }
}

/// Connects back to the spawning process and delivers `value` over TCP
#[derive(Debug, Serialize, Deserialize)]
pub struct Dial {
    pub port: u16,
    pub value: i32,
}

impl Work for Dial {
    const TAG: &'static str = "dial";
    type Output = ();
    type Error = ExecError;

    fn run(self) -> Result<(), ExecError> {
        let promise = connect_promise::<i32>(("127.0.0.1", self.port))?;
        promise.set_value(self.value)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reexec_rs::listen;
    use std::thread;

    #[test]
    fn catalog_lists_every_kind() {
        assert_eq!(
            catalog().tags(),
            vec!["answer", "dial", "fail", "greet", "print_pid"]
        );
    }

    #[test]
    fn greet_mentions_name() {
        let greeting = Greet {
            name: "world".to_string(),
        }
        .run()
        .unwrap();
        assert!(greeting.starts_with("hello, world"));
    }

    #[test]
    fn fail_returns_its_message() {
        let err = Fail {
            message: "nope".to_string(),
        }
        .run()
        .unwrap_err();
        assert_eq!(err, "nope");
    }

    #[test]
    fn dial_delivers_over_tcp() {
        let listener = listen("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let dialer = thread::spawn(move || Dial { port, value: 7 }.run());
        let future = listener.accept_future::<i32>().unwrap();
        assert_eq!(future.get().unwrap(), 7);
        dialer.join().unwrap().unwrap();
    }
}
