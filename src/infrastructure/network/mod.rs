// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

pub mod confirm;
pub mod pool;
pub mod provider;
pub mod session;
pub mod swap;
