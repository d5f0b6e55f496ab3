/*
 * This file is part of w83mon.
 *
 * Copyright (C) 2025 w83mon contributors
 *
 * w83mon is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * w83mon is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with w83mon. If not, see <https://www.gnu.org/licenses/>.
 */

//! w83mon - W83781D family hardware monitor access
//!
//! This library wires the `wm-core` engine to a configuration file and
//! provides the logging setup used by the `w83mon` binary.

pub mod config;
pub mod logger;
pub mod monitor;

#[cfg(test)]
pub mod test_utils;
