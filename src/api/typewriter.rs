use std::io::Write;
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use super::data_models::{ReplySet, REPLY_COUNT};

pub const CHAR_INTERVAL: Duration = Duration::from_millis(30);
pub const REPLY_PAUSE: Duration = Duration::from_millis(500);

/// 打字机效果的输出端
pub trait RevealSink {
    /// 开始展示第 `index` 条回复
    fn on_start(&mut self, index: usize);
    /// 第 `index` 条回复当前可见的前缀
    fn on_update(&mut self, index: usize, visible: &str);
    /// 整轮展示结束（无论是否被取消）
    fn on_finish(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealOutcome {
    Completed,
    Cancelled,
}

/// 逐字展示三条回复：每字间隔固定时长，条与条之间停顿。
/// 同一时刻只有一条在展示。
#[derive(Debug, Clone, Copy)]
pub struct Typewriter {
    char_interval: Duration,
    pause: Duration,
}

impl Default for Typewriter {
    fn default() -> Self {
        Self::new(CHAR_INTERVAL, REPLY_PAUSE)
    }
}

impl Typewriter {
    pub fn new(char_interval: Duration, pause: Duration) -> Self {
        Self {
            char_interval,
            pause,
        }
    }

    /// 无延迟版本，用于非交互输出和测试
    pub fn instant() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub async fn reveal<S: RevealSink>(
        &self,
        replies: &ReplySet,
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> RevealOutcome {
        let outcome = self.reveal_all(replies, sink, cancel).await;
        sink.on_finish();
        outcome
    }

    async fn reveal_all<S: RevealSink>(
        &self,
        replies: &ReplySet,
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> RevealOutcome {
        for (index, text) in replies.iter().enumerate() {
            if cancel.is_cancelled() {
                return RevealOutcome::Cancelled;
            }
            sink.on_start(index);
            sink.on_update(index, "");

            // 按字符边界切前缀，保证不会截断多字节字符
            let boundaries: Vec<usize> = text
                .char_indices()
                .map(|(i, _)| i)
                .chain(std::iter::once(text.len()))
                .collect();

            for end in boundaries {
                if !self.tick(self.char_interval, cancel).await {
                    return RevealOutcome::Cancelled;
                }
                sink.on_update(index, &text[..end]);
            }

            if !self.tick(self.pause, cancel).await {
                return RevealOutcome::Cancelled;
            }
        }
        RevealOutcome::Completed
    }

    /// 等待一个间隔；被取消时返回 false
    async fn tick(&self, wait: Duration, cancel: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = sleep(wait) => true,
        }
    }
}

/// 界面上的三个回复槽位及当前正在展示的下标
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplySlots {
    slots: [String; REPLY_COUNT],
    current: Option<usize>,
}

impl ReplySlots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slots(&self) -> &[String; REPLY_COUNT] {
        &self.slots
    }

    pub fn current(&self) -> Option<usize> {
        self.current
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|s| s.is_empty())
    }

    /// 清空三个槽位
    pub fn reset(&mut self) {
        self.slots = Default::default();
        self.current = None;
    }
}

impl RevealSink for ReplySlots {
    fn on_start(&mut self, index: usize) {
        self.current = Some(index);
    }

    fn on_update(&mut self, index: usize, visible: &str) {
        if let Some(slot) = self.slots.get_mut(index) {
            slot.clear();
            slot.push_str(visible);
        }
    }

    fn on_finish(&mut self) {
        self.current = None;
    }
}

/// 把回复逐字写到终端
pub struct TerminalSink<W: Write> {
    out: W,
    printed: usize,
}

impl<W: Write> TerminalSink<W> {
    pub fn new(out: W) -> Self {
        Self { out, printed: 0 }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> RevealSink for TerminalSink<W> {
    fn on_start(&mut self, index: usize) {
        if index > 0 {
            let _ = writeln!(self.out);
        }
        let _ = write!(self.out, "{}. ", index + 1);
        let _ = self.out.flush();
        self.printed = 0;
    }

    fn on_update(&mut self, _index: usize, visible: &str) {
        // 只输出新增部分
        if visible.len() > self.printed {
            let _ = write!(self.out, "{}", &visible[self.printed..]);
            let _ = self.out.flush();
        }
        self.printed = visible.len();
    }

    fn on_finish(&mut self) {
        let _ = writeln!(self.out);
        let _ = self.out.flush();
    }
}
