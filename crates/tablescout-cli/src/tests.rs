use super::*;

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["tablescout"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn parses_profile_command() {
    let cli = Cli::try_parse_from(["tablescout", "profile"]).expect("expected valid cli args");
    assert!(matches!(cli.command, Some(Commands::Profile)));
}

#[test]
fn parses_search_with_repeated_locations() {
    let cli = Cli::try_parse_from([
        "tablescout",
        "search",
        "--location",
        "chicago",
        "-l",
        "boston",
        "--date",
        "2026-11-02",
        "--time",
        "19:30",
        "--covers",
        "4",
        "-n",
        "60",
    ])
    .expect("expected valid cli args");

    let Some(Commands::Search(args)) = cli.command else {
        panic!("expected search command");
    };
    assert_eq!(args.locations, vec!["chicago", "boston"]);
    assert_eq!(args.date.as_deref(), Some("2026-11-02"));
    assert_eq!(args.time.as_deref(), Some("19:30"));
    assert_eq!(args.covers, Some(4));
    assert_eq!(args.results_wanted, Some(60));
    assert!(args.output.is_none());
}

#[test]
fn search_accepts_start_url_and_snapshot() {
    let cli = Cli::try_parse_from([
        "tablescout",
        "search",
        "--start-url",
        "https://www.opentable.com/metro/chicago-restaurants",
        "--snapshot",
        "captures/chicago.json",
        "-o",
        "out.jsonl",
    ])
    .expect("expected valid cli args");

    let Some(Commands::Search(args)) = cli.command else {
        panic!("expected search command");
    };
    assert!(args.locations.is_empty());
    assert_eq!(
        args.snapshot.as_deref(),
        Some(std::path::Path::new("captures/chicago.json"))
    );
    assert_eq!(args.output.as_deref(), Some(std::path::Path::new("out.jsonl")));
}

#[test]
fn covers_must_be_a_number() {
    assert!(Cli::try_parse_from(["tablescout", "search", "--covers", "four"]).is_err());
}
