fn main() {
    let route = match handle_cli_flags() {
        Some(route) => route,
        None => return,
    };

    if let Err(err) = tweetlytics::run(route) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

/// Handles informational flags. Returns `None` when one of them ran and the
/// process should exit, otherwise the optional route to open.
fn handle_cli_flags() -> Option<Option<String>> {
    let mut saw_flag = false;
    let mut route = None;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("TweetLytics {}", tweetlytics::VERSION);
                saw_flag = true;
            }
            "--help" | "-h" => {
                println!(
                    "TweetLytics - Explore the argument and sentiment tree of a post from the terminal.\n\nUsage: tweetlytics [URL | ID | tweetExample1..3]\n\n  --version, -V        Show version and exit\n  --help,    -h        Show this help message\n  --check-config       Print the effective configuration and exit"
                );
                saw_flag = true;
            }
            "--check-config" => {
                saw_flag = true;
                if let Err(err) = check_config_once() {
                    eprintln!("Config check failed: {err:?}");
                    std::process::exit(1);
                }
            }
            other if other.starts_with('-') => {
                eprintln!("Unknown flag {other}. See --help.");
                std::process::exit(2);
            }
            other => {
                if route.is_none() {
                    route = Some(other.to_string());
                }
            }
        }
    }
    if saw_flag {
        None
    } else {
        Some(route)
    }
}

fn check_config_once() -> anyhow::Result<()> {
    let cfg = tweetlytics::config::load(tweetlytics::config::LoadOptions::default())?;
    let path = tweetlytics::app::friendly_path(tweetlytics::config::default_path().as_ref());
    println!("# config file: {path}");
    print!("{}", tweetlytics::config::to_yaml(&cfg)?);
    Ok(())
}
