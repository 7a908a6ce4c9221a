use super::form::FieldId;

/// The `ssh` / `inference` verification pair.
///
/// Flags are only raised by a successful probe (or, for `inference` in
/// `new_deployment` mode, a non-empty model discovery) and dropped by any
/// edit of the inputs the probe covered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerificationGate {
    ssh: bool,
    inference: bool,
}

impl VerificationGate {
    pub fn ssh(&self) -> bool {
        self.ssh
    }

    pub fn inference(&self) -> bool {
        self.inference
    }

    pub(crate) fn confirm_ssh(&mut self) {
        self.ssh = true;
    }

    pub(crate) fn confirm_inference(&mut self) {
        self.inference = true;
    }

    pub(crate) fn invalidate_ssh(&mut self) {
        self.ssh = false;
    }

    pub(crate) fn invalidate_inference(&mut self) {
        self.inference = false;
    }

    /// Drop whichever flag covers `field`.
    pub(crate) fn field_edited(&mut self, field: FieldId) {
        match field {
            FieldId::TargetNodes => self.invalidate_ssh(),
            FieldId::InferenceHost | FieldId::InferencePort => self.invalidate_inference(),
            _ => {}
        }
    }

    /// "Verified" means something else per mode.
    pub(crate) fn mode_changed(&mut self) {
        self.invalidate_inference();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_closed() {
        let gate = VerificationGate::default();
        assert!(!gate.ssh());
        assert!(!gate.inference());
    }

    #[test]
    fn edits_only_drop_the_covering_flag() {
        let mut gate = VerificationGate::default();
        gate.confirm_ssh();
        gate.confirm_inference();

        gate.field_edited(FieldId::MgmtHost);
        gate.field_edited(FieldId::ModelName);
        assert!(gate.ssh() && gate.inference());

        gate.field_edited(FieldId::InferencePort);
        assert!(gate.ssh());
        assert!(!gate.inference());

        gate.field_edited(FieldId::TargetNodes);
        assert!(!gate.ssh());
    }

    #[test]
    fn mode_change_drops_inference_whatever_its_value() {
        let mut gate = VerificationGate::default();
        gate.mode_changed();
        assert!(!gate.inference());
        gate.confirm_inference();
        gate.confirm_ssh();
        gate.mode_changed();
        assert!(!gate.inference());
        assert!(gate.ssh());
    }
}
