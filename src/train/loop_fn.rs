use std::fmt;
use std::time::Instant;

use log::{debug, info, warn};

use crate::data::source::{Batch, BatchSource};
use crate::error::{Result, SegError};
use crate::loss::cross_entropy::{CrossEntropyLoss, LossOutput};
use crate::metrics::iou::IouAccumulator;
use crate::network::mode::EvalScope;
use crate::network::network::SegNet;
use crate::optim::Optimizer;
use crate::tensor::Logits;
use crate::train::epoch_stats::PhaseResult;

/// Which pass a phase is; decides the mode and the log prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Train,
    Valid,
    Test,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Train => "train",
            Phase::Valid => "valid",
            Phase::Test => "test",
        })
    }
}

// ---------------------------------------------------------------------------
// Public entry points
// ---------------------------------------------------------------------------

/// One optimization pass over `source`.
///
/// Per batch: forward, cross-entropy, `zero_grad`, backward, `step`. Loss and
/// IoU are accumulated from the logits produced before the update.
pub fn train_epoch(
    net: &mut SegNet,
    optimizer: &mut dyn Optimizer,
    source: &mut dyn BatchSource,
    disp_step: usize,
) -> Result<PhaseResult> {
    net.train();
    net.set_grad_enabled(true);

    run_batches(net, source, Phase::Train, disp_step, |net, batch| {
        let out = net.forward(&batch.input)?;
        let LossOutput { loss, grad } = CrossEntropyLoss::loss_and_grad(&out.out, &batch.label.masks)?;

        optimizer.zero_grad(net);
        net.backward(&grad)?;
        optimizer.step(net);

        Ok((loss, out.out))
    })
}

/// Forward-only pass over `source` inside an [`EvalScope`]; parameters and
/// gradient buffers are not touched and the previous mode is restored on
/// return, including on error.
pub fn eval_epoch(
    net: &mut SegNet,
    source: &mut dyn BatchSource,
    phase: Phase,
    disp_step: usize,
) -> Result<PhaseResult> {
    let mut scope = EvalScope::enter(net);

    run_batches(&mut scope, source, phase, disp_step, |net, batch| {
        let out = net.forward(&batch.input)?;
        let loss = CrossEntropyLoss::loss(&out.out, &batch.label.masks)?;
        Ok((loss, out.out))
    })
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

/// Shared batch loop: accumulates loss and IoU, reports every `disp_step`
/// batches, and turns the sums into means at the end. The final loss divides
/// by `source.len()`, the running reports by the batches seen so far.
fn run_batches<F>(
    net: &mut SegNet,
    source: &mut dyn BatchSource,
    phase: Phase,
    disp_step: usize,
    mut on_batch: F,
) -> Result<PhaseResult>
where
    F: FnMut(&mut SegNet, &Batch) -> Result<(f64, Logits)>,
{
    if disp_step == 0 {
        return Err(SegError::InvalidConfig("disp_step must be at least 1".into()));
    }

    let total = source.len();
    let mut epoch_loss = 0.0;
    let mut ious = IouAccumulator::new();
    let mut cnt = 0usize;
    let mut drift_reported = false;

    let phase_start = Instant::now();
    let mut report_start = Instant::now();

    for batch in source.batches() {
        let batch = batch?;
        cnt += 1;

        let (loss, logits) = on_batch(net, &batch)?;
        epoch_loss += loss;
        ious.update(&logits, &batch.label.masks)?;
        debug!("{phase} batch {cnt}: size={} loss={loss:.6}", batch.size());

        if ious.size_changed() && !drift_reported {
            warn!(
                "{phase} batch {cnt} has size {}; IoU means divide by batches * last batch size",
                batch.size()
            );
            drift_reported = true;
        }

        if cnt % disp_step == 0 {
            let [iou_back, iou_fore] = ious.class_means()?;
            info!(
                "Iter: {cnt}/{total}, {phase} epoch loss: {:.6}, miou: {:.6}, iou_back: {iou_back:.6}, iou_fore: {iou_fore:.6}, time: {:.3}s",
                epoch_loss / cnt as f64,
                (iou_back + iou_fore) / 2.0,
                report_start.elapsed().as_secs_f64(),
            );
            report_start = Instant::now();
        }
    }

    if cnt == 0 {
        return Err(SegError::EmptySource);
    }
    if cnt != total {
        warn!("{phase} source reported {total} batches but yielded {cnt}; loss is divided by {total}");
    }

    // Mean over the batches the source claims to hold.
    let denom = if total == 0 { cnt } else { total };
    let loss = epoch_loss / denom as f64;
    let class_iou = ious.class_means()?;
    let miou = ious.miou()?;
    let elapsed_ms = phase_start.elapsed().as_millis() as u64;

    info!(
        "{phase} loss: {loss:.6}, miou: {miou:.6}, iou_back: {:.6}, iou_fore: {:.6}, time: {:.3}s",
        class_iou[0],
        class_iou[1],
        elapsed_ms as f64 / 1000.0,
    );

    Ok(PhaseResult { loss, miou, class_iou, batches: cnt, elapsed_ms })
}
