pub(super) const ROOT_LONG_ABOUT: &str = "\
Per-directory integrity manifests chained from leaves to root

Dirsum records the state of a directory tree in one small manifest file per
directory. Each manifest lists the directory's immediate children: the size,
modification time and content digest of every file, the type of every special
entry (symlinks, pipes, sockets, devices), and the digest of every
subdirectory's own manifest file.

Because a parent stores the digest of each child's manifest, the manifests form
a hash chain. The root manifest transitively vouches for everything beneath
it, and editing any manifest by hand is detected the next time its parent is
scanned.

CORE CONCEPTS:

  .dirsum.toml files:
    Each directory has a .dirsum.toml TOML file describing its immediate
    children. Subdirectories appear only by name and manifest digest, so a
    directory can be moved elsewhere as a self-contained unit.

  Classifications:
    Every entry is compared with its recorded state and classified as one of
    added, removed, changed, timestamp (only the modification time moved),
    unchanged or failed (could not be inspected).

TYPICAL WORKFLOW:

  1. Record a tree for the first time:
     $ dirsum update /path/to/tree

  2. Make changes, then look at what changed:
     $ dirsum status /path/to/tree

  3. Record the new state:
     $ dirsum update /path/to/tree

  4. Periodically check file contents against the recorded digests:
     $ dirsum verify /path/to/tree

GLOBAL OPTIONS:

  -C <DIR>       Change to DIR before doing anything
  -v, -vv        Log at info or debug level (default: warnings only)
  --log-level    Set the log level explicitly

  RUST_LOG is honored when neither -v nor --log-level is given.

EXIT CODES:

  0    Success, nothing to report
  1    status or verify found changes or errors
  255  Any other failure, including update runs that recorded errors
";

pub(super) const UPDATE_LONG_ABOUT: &str = "\
Scan the tree and rewrite manifests that are out of date

Scans every directory, hashes files that are new or whose size or modification
time changed, and rewrites the manifest of every directory whose entries
changed. Manifests are written bottom-up so that each parent records the
digest of what its child actually wrote; an unchanged subtree is left alone.

USAGE:

  dirsum update                          # Update the current directory
  dirsum update /path/to/tree            # Update a specific tree
  dirsum update --digest-all             # Also hash files that look unchanged
  dirsum update --rebuild                # Rehash and rewrite everything
  dirsum update --rebuild --default-hash blake3   # Migrate to another algorithm

ALGORITHMS:

  sha256 (default), sha512 and blake3. Files keep the algorithm they were first
  recorded with unless --rebuild is given.

ERRORS:

  Entries that cannot be read are left out of the rewritten manifest and show
  up as added on the next run. A directory that cannot be listed, or whose
  manifest cannot be loaded, is skipped with its whole subtree. Failures never
  stop the rest of the tree from being processed, but any recorded failure
  makes update exit with status 255.
";

pub(super) const STATUS_LONG_ABOUT: &str = "\
Show what changed since manifests were last written

Scans the tree and compares every entry against its manifest without writing
anything. Files that are new or whose size or modification time changed are
hashed.

USAGE:

  dirsum status                          # Entries that changed or have errors
  dirsum status --show all               # Every entry
  dirsum status --show removed           # Only removed entries
  dirsum status --digest-all             # Hash unchanged files too

OUTPUT:

  A  added        R  removed        M  changed
  T  timestamp    .  unchanged      !  failed

  Changed files are followed by the fields that differ:

  M  data.json
     size: 1.2 KB -> 1.5 KB
     digest: sha256:a1b2c3d4e5f6 -> sha256:f6e5d4c3b2a1

  Errors are listed under the entry they belong to, including integrity
  violations where a child manifest no longer matches its parent's digest.

--show VALUES:

  added, removed, changed (includes timestamp), timestamp, unchanged, failed,
  errors (any entry carrying an error message), all

EXIT CODES:

  0    No changes and no errors
  1    Changes or errors found
  255  The root could not be scanned
";

pub(super) const VERIFY_LONG_ABOUT: &str = "\
Hash every file and check the whole tree

Like status, but every file is hashed regardless of its metadata, so silent
corruption that preserves size and modification time is detected. Every
subdirectory's manifest is checked against the digest its parent recorded.
Nothing is written.

USAGE:

  dirsum verify
  dirsum verify /path/to/tree --progress

EXIT CODES:

  0    Verification successful
  1    Changes, corruption or errors found
  255  The root could not be scanned
";
