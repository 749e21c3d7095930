use console::style;
use log::{debug, info};
use reexec_rs::{Catalog, ExecError, ProcessRegistry, listen};

use crate::work::{Answer, Dial, Fail, Greet, PrintPid};

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// One-way greeting plus a two-way call that must answer 13
pub fn run_demo(registry: &ProcessRegistry) -> CommandResult {
    info!("Running one-way and two-way demo");

    registry.execute(Greet {
        name: "world".to_string(),
    })?;

    let future = registry.twoway_execute(Answer)?;
    debug!("Waiting on worker {:?}", future.origin());
    let answer = future.get()?;
    registry.wait()?;

    if answer != 13 {
        return Err(format!("expected 13 from the worker, got {}", answer).into());
    }

    println!("[✓] two-way worker answered {}", style(answer).bold());
    println!("{}", style("OK").green().bold());
    Ok(())
}

pub fn run_fanout(registry: &ProcessRegistry, count: usize) -> CommandResult {
    info!("Spawning {} one-way workers", count);

    for index in 0..count {
        let pid = registry.execute(PrintPid { index })?;
        debug!("Worker {} -> pid {}", index, pid);
    }

    registry.wait()?;
    println!("[✓] {} workers finished", count);
    Ok(())
}

pub fn run_fail(registry: &ProcessRegistry, message: String) -> CommandResult {
    info!("Running a worker that fails");

    match registry.twoway_execute(Fail { message })?.get() {
        Err(ExecError::Remote(exception)) => {
            println!(
                "[✓] worker {} reported: {}",
                exception.pid,
                style(&exception.description).yellow()
            );
            Ok(())
        }
        Err(e) => Err(e.into()),
        Ok(value) => Err(format!("worker was expected to fail but returned {}", value).into()),
    }
}

pub fn run_socket(registry: &ProcessRegistry, port: u16) -> CommandResult {
    let listener = listen(("127.0.0.1", port))?;
    let port = listener.local_addr()?.port();
    info!("Listening for the worker's promise on port {}", port);

    registry.execute(Dial { port, value: 13 })?;

    let value = listener.accept_future::<i32>()?.get()?;
    registry.wait()?;

    println!("[✓] received {} over 127.0.0.1:{}", style(value).bold(), port);
    Ok(())
}

pub fn list_catalog(catalog: &Catalog) {
    info!("Listing registered work kinds");
    println!("Registered work kinds:\n");

    for tag in catalog.tags() {
        println!("  {}", tag);
    }
}
