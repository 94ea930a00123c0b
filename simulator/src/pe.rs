use crate::provisioner::PeProvisioner;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PeStatus {
    Free,
    Busy,
}

/// Processing element: one CPU core with a fixed MIPS rating.
#[derive(Clone, Debug)]
pub struct Pe {
    id: u32,
    provisioner: PeProvisioner,
    status: PeStatus,
}

impl Pe {
    pub fn new(id: u32, mips: f64) -> Self {
        Self {
            id,
            provisioner: PeProvisioner::new(mips),
            status: PeStatus::Free,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn mips(&self) -> f64 {
        self.provisioner.capacity()
    }

    pub fn available_mips(&self) -> f64 {
        self.provisioner.available()
    }

    pub fn status(&self) -> PeStatus {
        self.status
    }

    pub fn is_free(&self) -> bool {
        self.status == PeStatus::Free
    }

    pub fn provisioner(&self) -> &PeProvisioner {
        &self.provisioner
    }

    pub(crate) fn provisioner_mut(&mut self) -> &mut PeProvisioner {
        &mut self.provisioner
    }

    pub(crate) fn set_status(&mut self, status: PeStatus) {
        self.status = status;
    }
}

/// Builds `count` identical PEs numbered from zero.
pub fn uniform_pes(count: u32, mips: f64) -> Vec<Pe> {
    (0..count).map(|id| Pe::new(id, mips)).collect()
}
