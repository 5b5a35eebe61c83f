/*! Integration tests for Bookkeep.
 *
 * This test suite is organized as a single integration test binary
 * following the pattern described by matklad in
 * https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html
 *
 * The module structure mirrors the main library structure:
 * - backend: Tests for the Backend trait and InMemoryBackend
 * - config: Tests for loading LibraryConfig and applying it to a Library
 * - entity: Tests for EntityStore and the entity half of the Library API
 * - ledger: Tests for BorrowLedger and lending through the Library
 * - scanner: Tests for InventoryScanner, legacy classification and DashboardView
 * - transaction: Tests for Transaction staging, commit and change events
 */

mod entity;
mod helpers;
mod transaction;
