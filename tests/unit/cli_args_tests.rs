//! Unit tests for CLI argument parsing
#[cfg(test)]
mod tests {
    use consistency::cli::args::{Command, parse_args};
    use std::time::Duration;

    fn make_args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_check_with_filters() {
        let argv = make_args(&[
            "consistency",
            "check",
            "/mnt/site",
            "--inventory",
            "site.txt",
            "--dirs",
            "mc, data",
            "--protect",
            "/store/mc/keep",
            "--orphan-ok",
            "/store/data/tmp,/store/data/scratch",
            "--ignore-age",
            "86400",
            "--site",
            "T2_XX",
        ]);

        let parsed = parse_args(&argv).expect("parse check args");
        let Command::Check(check) = parsed.command else {
            panic!("expected check command");
        };

        assert_eq!(check.crawl.root, "/mnt/site");
        assert_eq!(check.inventory.as_deref(), Some("site.txt"));
        assert_eq!(check.crawl.directories, vec!["mc", "data"]);
        assert_eq!(check.protect, vec!["/store/mc/keep"]);
        assert_eq!(
            check.orphan_ok,
            vec!["/store/data/tmp", "/store/data/scratch"]
        );
        assert_eq!(check.crawl.site, "T2_XX");

        let options = check.crawl.to_options(check.ignore_age_secs);
        assert_eq!(options.ignore_age, Some(Duration::from_secs(86_400)));
        assert!(options.dry_run);
        assert_eq!(options.location, "/store");
    }

    #[test]
    fn parse_list_defaults() {
        let argv = make_args(&["consistency", "list", "/mnt/site", "--snapshot", "s.parquet"]);

        let parsed = parse_args(&argv).expect("parse list args");
        let Command::List(list) = parsed.command else {
            panic!("expected list command");
        };

        assert_eq!(list.snapshot.as_deref(), Some("s.parquet"));
        assert_eq!(list.crawl.site, "local");
        assert_eq!(list.crawl.retries, 3);
        assert!(list.crawl.directories.is_empty());
        assert!(list.crawl.stop_file.is_none());
    }

    #[test]
    fn zero_ignore_age_disables_cutoff() {
        let argv = make_args(&["consistency", "check", "/mnt/site", "--ignore-age", "0"]);

        let parsed = parse_args(&argv).expect("parse check args");
        let Command::Check(check) = parsed.command else {
            panic!("expected check command");
        };
        assert!(check.crawl.to_options(check.ignore_age_secs).ignore_age.is_none());
    }

    #[test]
    fn parse_view_with_path() {
        let argv = make_args(&["consistency", "view", "s.parquet", "--path", "/store/mc", "--json"]);

        let parsed = parse_args(&argv).expect("parse view args");
        let Command::View(view) = parsed.command else {
            panic!("expected view command");
        };

        assert_eq!(view.snapshot, "s.parquet");
        assert_eq!(view.path.as_deref(), Some("/store/mc"));
        assert!(view.json);
    }

    #[test]
    fn rejects_invalid_arguments() {
        for raw in [
            &["consistency", "check"][..],
            &["consistency", "check", "/mnt", "--retries", "0"],
            &["consistency", "list", "/mnt", "--location", "store"],
            &["consistency", "list", "/mnt", "--threads", "many"],
            &["consistency", "list", "/mnt", "--snapshot"],
            &["consistency", "list", "/mnt", "/other"],
            &["consistency", "view"],
            &["consistency", "scan", "/mnt"],
        ] {
            assert!(parse_args(&make_args(raw)).is_err(), "accepted {raw:?}");
        }
    }
}
