//! 식별자 생성.

use uuid::Uuid;

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// 난수 base36 문자열 (uuid v4 난수 비트 사용)
pub fn random_base36(len: usize) -> String {
    let mut out = String::with_capacity(len);
    let mut bits = Uuid::new_v4().as_u128();
    for _ in 0..len {
        if bits == 0 {
            bits = Uuid::new_v4().as_u128();
        }
        out.push(BASE36[(bits % 36) as usize] as char);
        bits /= 36;
    }
    out
}

/// `session_<epochMillis>_<9 base36>`
pub fn session_id(now_millis: i64) -> String {
    format!("session_{now_millis}_{}", random_base36(9))
}

/// `txn_<epochMillis>_<9 base36>`
pub fn transaction_id(now_millis: i64) -> String {
    format!("txn_{now_millis}_{}", random_base36(9))
}
