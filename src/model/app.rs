/// Pane that receives keyboard input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pane {
    Update,   // update script output, F2 runs the script
    Terminal, // keys are forwarded to the shell
}

impl Pane {
    pub fn toggled(self) -> Self {
        match self {
            Pane::Update => Pane::Terminal,
            Pane::Terminal => Pane::Update,
        }
    }
}
