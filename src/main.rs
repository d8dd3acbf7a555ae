use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cfg = emphasis_field::config::Config::parse();
    if cfg.list_devices {
        emphasis_field::audio::list_input_devices()?;
        return Ok(());
    }

    emphasis_field::app::run(cfg)
}
