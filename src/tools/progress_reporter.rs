/// 進度回報（百分比 0-100）
///
/// 核心元件只透過此 trait 回報進度，不關心呼叫端如何轉送；
/// 閉包與 [`NoProgress`] 皆可直接使用。
pub trait ProgressReporter {
    fn report(&self, percent: f64);
}

impl<F: Fn(f64)> ProgressReporter for F {
    fn report(&self, percent: f64) {
        self(percent);
    }
}

/// 不回報任何進度
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _percent: f64) {}
}

/// 將子任務的 0-100 映射到整體進度中的一段區間
pub struct ScaledProgress<'a> {
    inner: &'a dyn ProgressReporter,
    offset: f64,
    span: f64,
}

impl<'a> ScaledProgress<'a> {
    #[must_use]
    pub fn new(inner: &'a dyn ProgressReporter, offset: f64, span: f64) -> Self {
        Self {
            inner,
            offset,
            span,
        }
    }
}

impl ProgressReporter for ScaledProgress<'_> {
    fn report(&self, percent: f64) {
        let clamped = percent.clamp(0.0, 100.0);
        self.inner.report(self.offset + clamped / 100.0 * self.span);
    }
}
