//! 从连续字节流中切分顶层 JSON 对象。
//!
//! 扫描只关心 `{`、`}`、`"`、`\` 四个 ASCII 字符，它们不会出现在 UTF-8
//! 多字节序列内部，因此按字节扫描、按字节下标切片是安全的。
//!
//! 已知限制：
//! - 第一个 `{` 之前的字节会一直保留，直到后面出现完整对象时随之丢弃。
//! - 字符串永不闭合（缺少结尾 `"`）时缓冲区会持续增长，不做截断。

use domain::RawFrame;

/// 在 `buffer` 中寻找第一个完整的顶层对象。
///
/// 找到时返回该帧与帧之后的剩余部分（帧之前的字节被丢弃）；
/// 否则返回 `None` 与原样的 `buffer`。
pub fn extract(buffer: &str) -> (Option<RawFrame>, &str) {
    let bytes = buffer.as_bytes();
    let Some(start) = bytes.iter().position(|&b| b == b'{') else {
        return (None, buffer);
    };

    let mut depth: usize = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + 1;
                    return (Some(RawFrame::new(&buffer[start..end])), &buffer[end..]);
                }
            }
            _ => {}
        }
    }

    (None, buffer)
}

/// 读循环独占的累积缓冲区。
///
/// 字节先经过增量 UTF-8 解码：被读边界截断的多字节字符留待下次补全，
/// 真正非法的字节替换为 U+FFFD。
#[derive(Debug, Default)]
pub struct AccumulationBuffer {
    text: String,
    pending: Vec<u8>,
}

impl AccumulationBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加新读到的字节。
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        let mut input = std::mem::take(&mut self.pending);
        input.extend_from_slice(bytes);

        let mut rest = input.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    self.text.push_str(valid);
                    return;
                }
                Err(err) => {
                    let valid_up_to = err.valid_up_to();
                    // valid_up_to 之前已校验为合法 UTF-8
                    self.text
                        .push_str(&String::from_utf8_lossy(&rest[..valid_up_to]));
                    match err.error_len() {
                        Some(invalid_len) => {
                            self.text.push(char::REPLACEMENT_CHARACTER);
                            rest = &rest[valid_up_to + invalid_len..];
                        }
                        None => {
                            self.pending = rest[valid_up_to..].to_vec();
                            return;
                        }
                    }
                }
            }
        }
    }

    /// 取出下一个完整帧；没有时缓冲区保持不变。
    pub fn next_frame(&mut self) -> Option<RawFrame> {
        let (frame, remainder) = extract(&self.text);
        let frame = frame?;
        self.text = remainder.to_string();
        Some(frame)
    }

    /// 取出当前所有完整帧，按到达顺序排列。
    pub fn drain_frames(&mut self) -> Vec<RawFrame> {
        std::iter::from_fn(|| self.next_frame()).collect()
    }

    /// 已解码、等待切分的文本。
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// 等待补全的 UTF-8 尾部字节数。
    pub fn pending_bytes(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.pending.clear();
    }
}
