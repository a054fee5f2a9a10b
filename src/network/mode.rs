use std::ops::{Deref, DerefMut};

use crate::network::network::SegNet;

/// Train/inference switch for layers whose behavior differs between the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Train,
    Eval,
}

/// Puts a network in eval mode with gradient recording off for as long as
/// the guard lives.
///
/// The previous mode and recording flag come back on drop, whether the
/// phase finished, returned early with `?`, or unwound.
pub struct EvalScope<'a> {
    net: &'a mut SegNet,
    prev_mode: Mode,
    prev_grad: bool,
}

impl<'a> EvalScope<'a> {
    pub fn enter(net: &'a mut SegNet) -> EvalScope<'a> {
        let prev_mode = net.mode();
        let prev_grad = net.is_grad_enabled();
        net.eval();
        net.set_grad_enabled(false);
        EvalScope { net, prev_mode, prev_grad }
    }
}

impl Deref for EvalScope<'_> {
    type Target = SegNet;

    fn deref(&self) -> &SegNet {
        self.net
    }
}

impl DerefMut for EvalScope<'_> {
    fn deref_mut(&mut self) -> &mut SegNet {
        self.net
    }
}

impl Drop for EvalScope<'_> {
    fn drop(&mut self) {
        self.net.clear_tapes();
        self.net.set_mode(self.prev_mode);
        self.net.set_grad_enabled(self.prev_grad);
    }
}
