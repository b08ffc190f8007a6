use plugpack_core::VersionName;

/// One committed install, with enough context to render an upgrade arrow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallNote {
    pub name: String,
    pub version: VersionName,
    pub previous: Option<VersionName>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptError {
    pub context: String,
    pub message: String,
}

/// Cumulative outcome of one transaction run. Partial failure is the
/// normal shape: errors accumulate next to the work that did succeed.
#[derive(Debug, Default)]
pub struct Receipt {
    installs: Vec<InstallNote>,
    removals: Vec<String>,
    errors: Vec<ReceiptError>,
    cancelled: bool,
}

impl Receipt {
    pub fn add_install(
        &mut self,
        name: impl Into<String>,
        version: VersionName,
        previous: Option<VersionName>,
    ) {
        self.installs.push(InstallNote {
            name: name.into(),
            version,
            previous,
        });
    }

    pub fn add_removal(&mut self, name: impl Into<String>) {
        self.removals.push(name.into());
    }

    pub fn add_error(&mut self, context: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ReceiptError {
            context: context.into(),
            message: message.into(),
        });
    }

    pub(crate) fn set_cancelled(&mut self) {
        self.cancelled = true;
    }

    pub fn installs(&self) -> &[InstallNote] {
        &self.installs
    }

    pub fn removals(&self) -> &[String] {
        &self.removals
    }

    pub fn errors(&self) -> &[ReceiptError] {
        &self.errors
    }

    pub fn cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.installs.is_empty() && self.removals.is_empty() && self.errors.is_empty()
    }
}
