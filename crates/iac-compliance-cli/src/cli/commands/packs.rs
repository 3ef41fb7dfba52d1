use iac_compliance_core::RulePack;

use crate::cli::args::{OutputFormat, PacksArgs};
use crate::exit_codes;

pub fn run(args: PacksArgs) -> anyhow::Result<i32> {
    let manager = super::pack_manager(&args.manifest);
    let manifests = args.manifest.manifest_paths();
    let packs = if args.all {
        manager.load(&manifests)?
    } else {
        manager.enabled_packs(&manifests)?
    };

    let rendered = match args.format {
        OutputFormat::Json => serde_json::to_string_pretty(&packs)?,
        OutputFormat::Table => render_packs(&packs),
    };
    println!("{}", rendered);
    Ok(exit_codes::EXIT_SUCCESS)
}

fn render_packs(packs: &[RulePack]) -> String {
    if packs.is_empty() {
        return "No rule packs configured.".to_string();
    }

    let mut out = String::new();
    for pack in packs {
        out.push_str(&format!(
            "{} ({})\n",
            pack.name,
            if pack.enabled { "enabled" } else { "disabled" }
        ));
        if let Some(module) = &pack.module {
            out.push_str(&format!("  module: {}\n", module));
        }
        if let Some(source) = &pack.source {
            out.push_str(&format!("  source: {}\n", source));
        }
        for option in pack.option_args() {
            out.push_str(&format!("  option: {}\n", option));
        }
        for (rule, severity) in &pack.severity_overrides {
            out.push_str(&format!("  severity: {} -> {}\n", rule, severity));
        }
    }
    out.trim_end().to_string()
}
