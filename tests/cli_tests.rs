#[cfg(test)]
mod tests {
    use clap::Parser;
    use rowsyncrs::cli::{validate_device, Args};
    use rowsyncrs::config::Settings;

    fn mock_devices() -> Vec<String> {
        vec!["Mock Device 1".to_string(), "Mock Device 2".to_string()]
    }

    #[test]
    fn test_args_without_options() {
        let args = Args::parse_from(["test"]);
        assert!(!args.device_list);
        assert!(!args.select);
        assert!(!args.no_clock);
        assert_eq!(args.output, None);
        assert_eq!(args.input, None);
        assert_eq!(args.device_id, None);
    }

    #[test]
    fn test_args_with_ports() {
        let args = Args::parse_from([
            "test",
            "--output",
            "Mock Device 1",
            "--input",
            "Mock Device 2",
        ]);
        assert_eq!(args.output, Some("Mock Device 1".to_string()));
        assert_eq!(args.input, Some("Mock Device 2".to_string()));
    }

    #[test]
    fn test_device_id_range_is_enforced() {
        assert!(Args::try_parse_from(["test", "--device-id", "127"]).is_ok());
        assert!(Args::try_parse_from(["test", "--device-id", "128"]).is_err());
    }

    #[test]
    fn test_valid_device_binding() {
        // Substring matches are accepted
        assert!(validate_device("Device 1", &mock_devices()).is_ok());
    }

    #[test]
    fn test_invalid_device_binding() {
        let result = validate_device("Nonexistent Device", &mock_devices());
        let error_msg = result.unwrap_err();
        assert!(error_msg.contains("Nonexistent Device"));
        assert!(error_msg.contains("  - Mock Device 1"));
        assert!(error_msg.contains("  - Mock Device 2"));
    }

    #[test]
    fn test_flags_override_defaults() {
        let mut settings = Settings::default();
        let args = Args::parse_from(["test", "--output", "Mock", "--device-id", "9"]);
        settings.apply_args(&args);
        assert_eq!(settings.midi_output.as_deref(), Some("Mock"));
        assert_eq!(settings.device_id, 9);
        // Untouched values keep their defaults
        assert_eq!(settings.tempo, 125.0);
        assert!(settings.send_clock);
    }
}
