//! `joi tools`: List the tools the assistant can call.

use joi_core::tool::ToolRegistry;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let registry = joi_tools::default_registry(&config.tools);

    println!("Tools ({}), workspace {}", registry.len(), config.tools.workspace_dir().display());
    println!();
    print!("{}", listing(&registry));
    Ok(())
}

fn listing(registry: &ToolRegistry) -> String {
    let mut out = String::new();
    for tool in registry.tools() {
        out.push_str(&format!("  {:<10} {:<14} {}\n", tool.name(), tool.label(), tool.description()));
        for line in tool.usage().lines().filter(|l| !l.trim().is_empty()) {
            out.push_str(&format!("  {:<10} {:<14}   {}\n", "", "", line.trim()));
        }
    }
    out
}
