/*!

This is the long-form manual for `booth_aggregation` and `boothtally`.

## Booth submissions

A booth submission carries the counts of one polling place:

* primary votes: first-preference votes, by candidate
* two-candidate-preferred (TCP) votes: for each TCP candidate, the votes that the
  ballots of every other candidate contributed to them
* totals: formal, informal and total votes

Submissions come from data entry and are often incomplete. Any count may be
missing, negative, a float or a string. Such counts are read as follows:

| input            | count |
|------------------|-------|
| `120`            | 120   |
| `-3`             | 0     |
| `12.9`           | 12    |
| `" 42 "`         | 42    |
| `"n/a"`, missing | 0     |

## Candidate labels

Every key of a submission (primary votes, TCP labels, sources of a distribution)
must designate one candidate of the electorate. The key is looked for, ignoring
case, in the full names of the candidates, and must be contained in exactly one
of them: `STEGGALL` designates `Zali Steggall`. A full name that is part of
another full name (`Amy Jones` and `Amy Jones-Smith`) is ambiguous, and so is a
configured TCP label that other names also contain.

A key contained in no name (`ZZZ`) or in several names (`A` with `Alice Smith` and
`Amy Jones`) makes the whole booth fail. With `skipUnresolvedBooths`, `boothtally`
reports these booths and aggregates the others.

## Derived figures

* primary percentage: the share of the candidate in the sum of all primary votes
* TCP total: the own primary votes of the candidate, plus the votes distributed to
  them by the other candidates. A distribution from a candidate to themselves is
  ignored.
* net position: the TCP leader, the runner-up, and the margin between them
* turnout: total votes over enrolled voters. Not reported without enrolment.
* party totals: the primary votes of the candidates of each party. A candidate
  without a party is a group of their own.
* swing: current share minus the baseline share, in points. A positive swing
  is a move toward the candidate.

The same figures (except turnout and party totals) are given for every booth.
A booth swing compares the booth with its own baseline, from `boothBaselineShares`.

Counts too large to be represented stay at the largest representable count.

All percentages are rounded to 2 decimals. Every percentage is 0 when its total is 0.

Submissions whose primary votes do not add up to the formal votes, or whose
formal and informal votes do not add up to the total, are listed in the summary
under `issues`. They are still counted as submitted.

## Configuration file

```json
{
  "outputSettings": { "electorateName": "Warringah", "electionDate": "2025-05-03" },
  "boothFileSources": [ { "provider": "json", "filePath": "booths.json" } ],
  "candidates": [
    { "name": "Zali Steggall", "tcpLabel": "STEGGALL", "party": "Independent" },
    { "name": "Katherine Deves", "tcpLabel": "DEVES", "party": "Liberal" }
  ],
  "rules": {
    "enrolledVoters": 110000,
    "totalBooths": 42,
    "baselineShares": { "STEGGALL": 60.96 },
    "boothBaselineShares": { "12": { "STEGGALL": 64.1 } },
    "swingBasis": "tcp",
    "tcpDisplayOrder": ["STEGGALL", "DEVES"],
    "skipUnresolvedBooths": true
  }
}
```

`tcpDisplayOrder` is a list of names or labels, `"ballot"` (by ballot position)
or `"roster"` (the order of `candidates`, the default).

If a booth appears more than once in the booth files, the last submission is
the one counted.

Providers:
* `json`: an array of booth objects with `boothId`, `boothName`, `timestamp`,
  `primaryVotes`, `tcpVotes` and `totals`. Keys are not case sensitive.
* `xlsx`: a worksheet with one row per booth (booth id, booth name, one column
  per candidate, then formal, informal and total). The optional `tcpWorksheetName`
  worksheet lists distributions one per row: booth id, TCP label, source candidate, votes.

 */
