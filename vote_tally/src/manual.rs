/*!

This is the long-form manual for `vote_tally` and `e14watch`.

## Overview

`vote_tally` aggregates witness-reported vote counts for an election-night
monitoring dashboard. Field witnesses submit one report per polling table;
each report carries a sparse map from candidate id to a vote count, an
optional count of blank ballots under the reserved `blank` key, and an
optional irregularity flag. The library reduces a snapshot of candidates and
a snapshot of reports into per-candidate totals, a grand total, alert
statistics and, once a configured vote threshold is crossed, a projected
winner.

The aggregation is a pure function and recomputes from scratch on every
call. The data sets involved (at most a few thousand polling tables) make a
full pass trivially cheap, so there is no incremental mode: whenever either
snapshot changes, call the function again with the latest pair.

## Tolerance policy

An election-night dashboard must keep showing the valid part of the tally
even when individual submissions are partially broken. The aggregation
therefore never fails on data-shape problems:

* a vote entry that is negative or not a number contributes zero;
* an entry referencing an unknown candidate id is skipped (the candidate
  and report snapshots are delivered independently, so a report may be ahead
  of the candidate list);
* an empty report list yields a zero-valued result for every candidate;
* the submitter-declared total is never trusted: the grand total is always
  recomputed from the entries. Reports whose declared total disagrees with
  the recomputed sum are counted and logged, nothing more.

## Input files for `e14watch`

The command line tool reads two JSON snapshot files, typically exported from
the document store backing the dashboard.

`candidates.json` is an array of candidate documents:

```json
[
  {"id": "cand1", "name": "Carlos Gómez", "party": "Partido Verde",
   "ballotNumber": 1, "color": "#2a9d8f", "position": "gobernacion"},
  {"id": "cand2", "name": "María López", "party": "Cambio Radical",
   "ballotNumber": 2, "color": "#1a3a6c", "position": "gobernacion"}
]
```

Documents with `"active": false` are skipped. The `--election-type` flag
restricts the tally to candidates with a matching `position`.

`reports.json` is an array of report documents:

```json
[
  {"votes": {"cand1": 120, "cand2": 80, "blank": 4}, "totalVotes": 204,
   "municipality": "manizales", "tableNumber": "017",
   "hasIrregularity": false},
  {"hasIrregularity": true, "irregularityType": "presion",
   "observation": "...", "municipality": "neira"}
]
```

All report fields are optional. Vote values that are not non-negative
integers degrade to zero.

## Output

The summary is a JSON document with the grand total, the blank-ballot count,
the standings sorted by votes descending, the projected winner (when the
`--threshold` flag is set and reached), table coverage against the
municipality registry, and the active alert count. `--by-municipality` adds
a per-municipality breakdown. `--reference` compares the summary against a
reference file and reports any difference.

## Watch mode

`--watch N` re-reads the snapshot files every `N` seconds and recomputes the
summary whenever either file changed. This reproduces the dashboard's
subscription loop: immutable snapshots in, a fresh stateless tally out.

*/
