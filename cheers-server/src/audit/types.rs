//! 审计日志类型定义

use serde::{Deserialize, Serialize};

/// 审计操作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    // ═══ 系统生命周期 ═══
    SystemStartup,
    SystemShutdown,

    // ═══ 库存 ═══
    /// 发放一枚贴纸
    StickerAwarded,
    /// 撤回一枚贴纸
    StickerRevoked,
    /// 管理员移除（归零时删除行）
    StickerRemovedByAdmin,

    // ═══ 贴纸板 ═══
    /// 非所有者在他人贴纸板上放置（消耗一份额度）
    CheerPlaced,
    /// 所有者追加贴纸时消耗库存
    StickerConsumed,
    /// 贴纸板更新
    BoardUpdated,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SystemStartup => "system_startup",
            Self::SystemShutdown => "system_shutdown",
            Self::StickerAwarded => "sticker_awarded",
            Self::StickerRevoked => "sticker_revoked",
            Self::StickerRemovedByAdmin => "sticker_removed_by_admin",
            Self::CheerPlaced => "cheer_placed",
            Self::StickerConsumed => "sticker_consumed",
            Self::BoardUpdated => "board_updated",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        [
            Self::SystemStartup,
            Self::SystemShutdown,
            Self::StickerAwarded,
            Self::StickerRevoked,
            Self::StickerRemovedByAdmin,
            Self::CheerPlaced,
            Self::StickerConsumed,
            Self::BoardUpdated,
        ]
        .into_iter()
        .find(|a| a.as_str() == raw)
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 审计日志条目（不可变）
///
/// - `prev_hash`: 前一条记录的哈希 (首条为 `genesis`)
/// - `curr_hash`: SHA256(prev_hash + 所有字段)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// 全局递增序列号
    pub id: i64,
    /// Unix 毫秒
    pub timestamp: i64,
    pub action: AuditAction,
    /// "inventory" | "board" | "system"
    pub resource_type: String,
    pub resource_id: String,
    pub operator_id: Option<String>,
    /// 触发该事件的 opId
    pub op_id: Option<String>,
    pub details: serde_json::Value,
    pub prev_hash: String,
    pub curr_hash: String,
}

/// 审计日志查询参数
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditQuery {
    /// 起始时间（Unix 毫秒，含）
    pub from: Option<i64>,
    /// 截止时间（Unix 毫秒，含）
    pub to: Option<i64>,
    pub action: Option<AuditAction>,
    pub operator_id: Option<String>,
    pub resource_type: Option<String>,
    #[serde(default)]
    pub offset: i64,
    /// 默认 50，最大 500
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
pub struct AuditListResponse {
    pub items: Vec<AuditEntry>,
    pub total: i64,
}

/// 审计链验证结果
#[derive(Debug, Serialize)]
pub struct AuditChainVerification {
    pub total_entries: i64,
    pub chain_intact: bool,
    pub breaks: Vec<AuditChainBreak>,
}

/// 审计链断裂点
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct AuditChainBreak {
    pub entry_id: i64,
    pub expected_prev_hash: String,
    pub actual_prev_hash: String,
    /// 条目自身哈希与内容不符（内容被改写）
    pub hash_mismatch: bool,
}
