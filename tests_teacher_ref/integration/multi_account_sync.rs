// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Integration tests for multi-account email synchronization
//!
//! This test suite verifies that the email caching system properly isolates data
//! between multiple accounts, using email addresses as account identifiers throughout.
