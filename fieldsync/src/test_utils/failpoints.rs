use fail::FailScenario;

/// Activates failpoints for the lifetime of the value and switches them off on drop.
pub struct CustomFailScenario<'a> {
    _scenario: FailScenario<'a>,
    failpoints: Vec<(String, String)>,
}

impl<'a> CustomFailScenario<'a> {
    /// Configures each `(failpoint, action)` pair, e.g. `("commit.before_batch", "1*return")`.
    pub fn setup(failpoints: &[(&str, &str)]) -> CustomFailScenario<'a> {
        let scenario = FailScenario::setup();
        let failpoints = failpoints
            .iter()
            .map(|(name, action)| (name.to_string(), action.to_string()))
            .collect::<Vec<_>>();

        for (failpoint, action) in &failpoints {
            fail::cfg(failpoint, action).unwrap();
        }

        Self {
            _scenario: scenario,
            failpoints,
        }
    }
}

impl Drop for CustomFailScenario<'_> {
    fn drop(&mut self) {
        for (failpoint, _) in &self.failpoints {
            fail::cfg(failpoint, "off").unwrap();
        }
    }
}
