const USAGE: &str = "Usage:
  pine                       start the resident instance
  pine select                capture a region and copy its text (via the resident instance if any)
  pine action select-text    ask the resident instance to capture (runs once if none)
  pine models                list installed trained data
  pine config language <code>
  pine config log-level <error|warn|info|debug|trace>";

fn usage_exit() -> ! {
    eprintln!("{USAGE}");
    std::process::exit(2);
}

fn main() {
    let mut args = std::env::args().skip(1);
    let Some(command) = args.next() else {
        pine_lib::run();
        return;
    };

    match command.as_str() {
        "select" => {
            if pine_lib::send_action_to_running_instance("select-text").is_err() {
                pine_lib::run_once();
            }
        }
        "action" => {
            let Some(action) = args.next() else {
                usage_exit();
            };

            if pine_lib::send_action_to_running_instance(&action).is_err() {
                if let Err(e) = pine_lib::run_action_locally(&action) {
                    eprintln!("{e}");
                    usage_exit();
                }
            }
        }
        "models" => match pine_lib::installed_languages() {
            Ok(languages) if languages.is_empty() => println!("No trained data installed"),
            Ok(languages) => {
                for language in languages {
                    println!("{language}");
                }
            }
            Err(e) => {
                eprintln!("{e}");
                std::process::exit(1);
            }
        },
        "config" => {
            let (Some(key), Some(value)) = (args.next(), args.next()) else {
                usage_exit();
            };
            match key.as_str() {
                "language" => pine_lib::config::save_language(value.trim()),
                "log-level" => match pine_lib::config::LogLevel::from_str(&value) {
                    Some(level) => pine_lib::config::save_log_level(level),
                    None => usage_exit(),
                },
                _ => usage_exit(),
            }
        }
        _ => usage_exit(),
    }
}
