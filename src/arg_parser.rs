use std::path::PathBuf;

use argparse::{ArgumentParser, Print, StoreOption};

#[derive(Debug, Default)]
pub struct ArgsOptions {
    // Json configuration, the built-in defaults are used when missing
    pub config_file_path: Option<PathBuf>,

    // Overrides the configured polling interval
    pub interval_ms: Option<u64>,
}

impl ArgsOptions {
    pub fn parse() -> Self {
        let mut options = ArgsOptions::default();

        {
            let mut parser = ArgumentParser::new();
            parser.set_description(
                "Drive PWM fans from the coolant temperature of a liquid cooler",
            );

            // Configuration file path
            parser.refer(&mut options.config_file_path).add_option(
                &["-c", "--config"],
                StoreOption,
                "The file path of the configuration file",
            );

            // Polling interval
            parser.refer(&mut options.interval_ms).add_option(
                &["-i", "--interval"],
                StoreOption,
                "Milliseconds between two temperature readings",
            );

            // Show controller version
            parser.add_option(
                &["-V", "--version"],
                Print(env!("CARGO_PKG_VERSION").to_string()),
                "Show the controller version",
            );

            parser.parse_args_or_exit();
        }

        options
    }
}
