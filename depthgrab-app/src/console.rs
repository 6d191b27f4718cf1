//! Console text and Enter prompts of the example.

use depthgrab_capture::{AcquisitionHooks, Backend};
use std::cell::RefCell;
use std::io::{self, BufRead, Write};
use tracing::debug;

pub const HEADER: &str = "\
[EXAMPLE NAME]
depthgrab

[SYNOPSIS]
This program acquires a 3d point cloud from a depth camera, converts it
into a multi-component container (range, reflectance, confidence) and
displays the result.
";

/// Prints prompts and, when interactive, waits for Enter.
pub struct Console<W: Write = io::Stdout> {
    out: RefCell<W>,
    interactive: bool,
}

impl Console {
    pub fn stdout(interactive: bool) -> Self {
        Self::new(io::stdout(), interactive)
    }
}

impl<W: Write> Console<W> {
    pub fn new(out: W, interactive: bool) -> Self {
        Self {
            out: RefCell::new(out),
            interactive,
        }
    }

    pub fn print(&self, text: &str) {
        if let Err(e) = writeln!(self.out.borrow_mut(), "{}", text) {
            debug!("Could not write to console: {}", e);
        }
    }

    /// Print `Press <Enter> to {action}.` and wait.
    pub fn pause(&self, action: &str) {
        self.print(&format!("Press <Enter> to {}.\n", action));
        if !self.interactive {
            return;
        }
        if let Err(e) = self.out.borrow_mut().flush() {
            debug!("Could not flush console: {}", e);
        }
        let mut line = String::new();
        if let Err(e) = io::stdin().lock().read_line(&mut line) {
            debug!("Could not read from stdin: {}", e);
        }
    }

    #[cfg(test)]
    pub fn into_output(self) -> W {
        self.out.into_inner()
    }
}

/// Hooks that pause before triggering the sensor.
pub struct PromptHooks<'a, W: Write> {
    console: &'a Console<W>,
}

impl<'a, W: Write> PromptHooks<'a, W> {
    pub fn new(console: &'a Console<W>) -> Self {
        Self { console }
    }
}

impl<W: Write> AcquisitionHooks for PromptHooks<'_, W> {
    fn before_capture(&mut self) {
        self.console
            .print("\nThe 3d sensor will be started and triggered to acquire a 3d point cloud.\n");
        self.console.pause("continue");
    }
}

/// Instructions shown when the requested device is not part of this build.
pub fn setup_instructions(requested: &str) -> String {
    let available: Vec<String> = Backend::available().iter().map(|b| b.to_string()).collect();
    let mut text = format!(
        "The device backend '{}' is not available in this build.\n\n",
        requested
    );
    text.push_str("To run the example with a physical camera:\n\n");
    text.push_str("- Install the camera manufacturer's SDK.\n");
    text.push_str("- Implement the DeviceDriver and DeviceSession traits of depthgrab-capture\n");
    text.push_str("  for the camera, mapping connect/configure/capture/disconnect to SDK calls.\n");
    text.push_str("- Register the backend and rebuild.\n");
    if !Backend::Replay.is_available() {
        text.push_str("- PLY replay requires building with the `replay` feature.\n");
    }
    text.push_str(&format!("\nAvailable backends: {}\n", available.join(", ")));
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pause_prints_prompt_without_waiting() {
        let console = Console::new(Vec::new(), false);
        console.print("hello");
        console.pause("start");
        let text = String::from_utf8(console.into_output()).unwrap();
        assert_eq!(text, "hello\nPress <Enter> to start.\n\n");
    }

    #[test]
    fn test_instructions_list_backends() {
        let text = setup_instructions("zivid");
        assert!(text.contains("'zivid'"));
        assert!(text.contains("simulated"));
    }
}
