use anyhow::{bail, Context};

use otto_menu::{
    config::Config,
    menu::{
        Action, InputMode, Menu, MenuAnchor, MenuGeometry, MenuHost, MenuItemKind, MenuRegistry,
        MenuSession, StackedLayout, ViewId,
    },
};

static USAGE: &[&str] = &[
    "--list : Print the configured menu trees.",
    "--pipe <menu-id> : Run the pipe menu <menu-id> and print what it generates.",
];

/// Lays menus out without drawing them and logs what would be executed
struct HeadlessHost {
    layout: StackedLayout,
}

impl MenuHost for HeadlessHost {
    fn set_input_mode(&mut self, mode: InputMode) {
        tracing::debug!(?mode, "input mode");
    }

    fn layout_menu(&mut self, menu: &Menu, anchor: MenuAnchor) -> MenuGeometry {
        self.layout.layout(menu, anchor, None)
    }

    fn run_actions(&mut self, actions: &[Action], target: Option<ViewId>) {
        tracing::info!(?actions, ?target, "run actions");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Ok(env_filter) = tracing_subscriber::EnvFilter::try_from_default_env() {
        tracing_subscriber::fmt()
            .compact()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("info")
            .compact()
            .init();
    }

    #[cfg(feature = "profile-with-tracy")]
    profiling::tracy_client::Client::start();

    profiling::register_thread!("Main Thread");

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["--list"] => {
            let registry = Config::with(|config| MenuRegistry::from_definitions(&config.menus));
            for menu in registry.top_level() {
                print_menu(&registry, menu, 0);
            }
        }
        ["--pipe", id] => run_pipe_menu(id).await?,
        _ => {
            println!("USAGE: otto-menu <command>");
            println!();
            println!("Commands:");
            for line in USAGE {
                println!("\t{}", line);
            }
        }
    }
    Ok(())
}

async fn run_pipe_menu(id: &str) -> anyhow::Result<()> {
    let (config, definitions) = Config::with(|config| (config.menu.clone(), config.menus.clone()));
    let mut host = HeadlessHost {
        layout: config.layout.clone(),
    };
    let mut session = MenuSession::from_definitions(config, &definitions);

    let menu = session
        .lookup_by_id(id)
        .with_context(|| format!("no menu with id `{id}`"))?;
    if !menu.is_pipemenu() {
        bail!("menu `{id}` is not a pipe menu");
    }
    let handle = menu.handle();

    session.open_root(handle, 0, 0, &mut host);
    while let Some(output) = session.next_pipe_output().await {
        session.dispatch_pipe_output(output, &mut host);
    }

    let menu = session
        .registry()
        .get(handle)
        .context("menu disappeared while generating")?;
    print_menu(session.registry(), menu, 0);
    session.close_root(&mut host);
    Ok(())
}

fn print_menu(registry: &MenuRegistry, menu: &Menu, depth: usize) {
    let indent = "  ".repeat(depth);
    let pipe = menu
        .execute()
        .map(|command| format!(" (pipe: {command})"))
        .unwrap_or_default();
    println!("{indent}[{}]{pipe}", menu.label().unwrap_or(menu.id()));

    for item in menu.items() {
        let text = item.text().unwrap_or_default();
        match item.kind() {
            MenuItemKind::SeparatorLine => println!("{indent}  ---"),
            MenuItemKind::Title => println!("{indent}  == {text} =="),
            MenuItemKind::Item => {
                let arrow = item.arrow().unwrap_or_default();
                let actions: Vec<&str> = item.actions().iter().map(|a| a.name.as_str()).collect();
                if actions.is_empty() {
                    println!("{indent}  {text} {arrow}");
                } else {
                    println!("{indent}  {text} -> {}", actions.join(", "));
                }
                // Only descend into owned submenus, linked ones are printed on their own
                if let Some(submenu) = item.submenu().and_then(|id| registry.get(id)) {
                    if submenu.owner() == Some(menu.handle()) {
                        print_menu(registry, submenu, depth + 1);
                    }
                }
            }
        }
    }
}
